//! test-value catalog: per-field and per-type value ranges used for
//! training and full-range verification.

use auspex_core::{infer_type, FieldRef, FieldType, Record, TypeRegistry};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// errors raised while resolving catalog values.
///
/// These are configuration gaps, not assertion failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no test data for type `{0}`")]
    NoTestData(String),
    #[error("can't infer the element type because collection `{0}` is empty")]
    EmptyCollection(String),
}

/// catalog of test and training values for one verification session.
///
/// Populated by configuration calls before verification begins and read
/// only afterwards. Stored by-type lists describe the nullable (boxed)
/// shape of a type; resolution drops null for non-nullable fields and
/// for fields marked non-null-only.
pub struct TestValueCatalog {
    test_by_field: BTreeMap<String, Vec<Value>>,
    training_by_field: BTreeMap<String, Value>,
    test_by_type: BTreeMap<String, Vec<Value>>,
    training_by_type: BTreeMap<String, Value>,
    /// declared type shape per registered by-type label, used when a
    /// registered type acts as a generating type.
    shapes: BTreeMap<String, FieldType>,
    non_null_fields: BTreeSet<String>,
    element_hints: BTreeMap<String, FieldType>,
    ignored_enum_names: BTreeSet<String>,
}

impl TestValueCatalog {
    /// empty catalog.
    pub fn new() -> Self {
        Self {
            test_by_field: BTreeMap::new(),
            training_by_field: BTreeMap::new(),
            test_by_type: BTreeMap::new(),
            training_by_type: BTreeMap::new(),
            shapes: BTreeMap::new(),
            non_null_fields: BTreeSet::new(),
            element_hints: BTreeMap::new(),
            ignored_enum_names: BTreeSet::new(),
        }
    }

    /// catalog pre-populated with the built-in value ranges.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.set_values_for_type(
            &FieldType::String,
            vec![json!("A test string."), Value::Null],
            json!("A test string."),
        );
        catalog.set_values_for_type(
            &FieldType::Int,
            vec![
                json!(i32::MIN),
                json!(i32::MAX),
                json!(1),
                json!(-1),
                json!(0),
                Value::Null,
            ],
            json!(1),
        );
        catalog.set_values_for_type(
            &FieldType::Long,
            vec![
                json!(i64::MIN),
                json!(i64::MAX),
                json!(1),
                json!(-1),
                json!(0),
                Value::Null,
            ],
            json!(1),
        );
        catalog.set_values_for_type(
            &FieldType::Float,
            vec![
                json!(f64::MIN_POSITIVE),
                json!(f64::MAX),
                json!(1.0),
                json!(-1.0),
                json!(0.0),
                Value::Null,
            ],
            json!(1.0),
        );
        catalog.set_values_for_type(
            &FieldType::Bool,
            vec![json!(true), json!(false), Value::Null],
            json!(true),
        );
        catalog.set_values_for_type(
            &FieldType::Date,
            vec![json!("1977-04-01"), Value::Null],
            json!("1977-04-01"),
        );
        catalog.set_values_for_type(
            &FieldType::Datetime,
            vec![json!("1977-04-01T00:00:00Z"), Value::Null],
            json!("1977-04-01T00:00:00Z"),
        );
        catalog
    }

    /// register test and training values for a field name.
    pub fn set_values_for_field(
        &mut self,
        field_name: impl Into<String>,
        test_values: Vec<Value>,
        training_value: Value,
    ) {
        let name = field_name.into();
        self.test_by_field.insert(name.clone(), test_values);
        self.training_by_field.insert(name, training_value);
    }

    /// register test and training values for all fields of a type.
    pub fn set_values_for_type(
        &mut self,
        r#type: &FieldType,
        test_values: Vec<Value>,
        training_value: Value,
    ) {
        let label = r#type.label();
        self.shapes.insert(label.clone(), r#type.clone());
        self.test_by_type.insert(label.clone(), test_values);
        self.training_by_type.insert(label, training_value);
    }

    /// register values for a type by its label, when only the label is
    /// known (catalog documents). Simple labels resolve to their built-in
    /// shapes; anything else is treated as a custom type.
    pub fn set_values_for_label(
        &mut self,
        label: &str,
        test_values: Vec<Value>,
        training_value: Value,
    ) {
        self.set_values_for_type(&parse_label(label), test_values, training_value);
    }

    /// return true when the type already has a by-type entry.
    pub fn has_type_entry(&self, label: &str) -> bool {
        self.test_by_type.contains_key(label)
    }

    /// register an enum type's members as its value range: every member
    /// not on the ignored-names list, plus null. No-op for other types
    /// and for enums that are already configured.
    pub fn register_enum(&mut self, r#type: &FieldType) {
        let FieldType::Enum { values, .. } = r#type else {
            return;
        };
        if self.has_type_entry(&r#type.label()) {
            return;
        }
        let (test_values, training_value) = self.enum_value_range(values);
        self.set_values_for_type(r#type, test_values, training_value);
    }

    /// register an enum type's members unconditionally, replacing any
    /// existing entry.
    pub fn set_values_for_enum_type(&mut self, r#type: &FieldType) {
        if let FieldType::Enum { values, .. } = r#type {
            let (test_values, training_value) = self.enum_value_range(values);
            self.set_values_for_type(r#type, test_values, training_value);
        }
    }

    pub(crate) fn enum_value_range(&self, members: &[String]) -> (Vec<Value>, Value) {
        let mut test_values: Vec<Value> = members
            .iter()
            .filter(|m| !self.ignored_enum_names.contains(*m))
            .map(|m| Value::String(m.clone()))
            .collect();
        let training_value = test_values.first().cloned().unwrap_or(Value::Null);
        test_values.push(Value::Null);
        (test_values, training_value)
    }

    /// mark a field as never receiving null.
    pub fn mark_non_null(&mut self, field_name: impl Into<String>) {
        self.non_null_fields.insert(field_name.into());
    }

    /// return true when the field is declared non-null-only.
    pub fn is_non_null(&self, field_name: &str) -> bool {
        self.non_null_fields.contains(field_name)
    }

    /// declare a collection field's element type explicitly.
    pub fn set_element_hint(&mut self, field_name: impl Into<String>, element_type: FieldType) {
        self.element_hints.insert(field_name.into(), element_type);
    }

    /// add enum member names that are skipped when deriving enum value
    /// ranges.
    pub fn ignore_enum_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_enum_names.extend(names.into_iter().map(Into::into));
    }

    /// resolve the element type of a collection field: explicit hint,
    /// then the declared item type when it is known, then sampling the
    /// field's content in the supplied freshly-built instance.
    ///
    /// Returns `None` for non-collection fields.
    pub fn element_type_for(
        &self,
        field: &FieldRef,
        sample: &Record,
    ) -> Result<Option<FieldType>, CatalogError> {
        let FieldType::List { item } = &field.r#type else {
            return Ok(None);
        };
        if let Some(hint) = self.element_hints.get(&field.name) {
            return Ok(Some(hint.clone()));
        }
        if **item != FieldType::Json {
            return Ok(Some((**item).clone()));
        }
        sample
            .get(&field.name)
            .as_array()
            .and_then(|elements| elements.first())
            .and_then(infer_type)
            .map(Some)
            .ok_or_else(|| CatalogError::EmptyCollection(field.name.clone()))
    }

    /// resolve the ordered test values for a field: by field name, then
    /// by exact type, then generated from a generating type, then
    /// synthesized collections. Null is dropped for non-nullable fields
    /// and for fields marked non-null-only.
    pub fn test_values_for(
        &self,
        field: &FieldRef,
        registry: &TypeRegistry,
        sample: &Record,
    ) -> Result<Vec<Value>, CatalogError> {
        let values = self.resolve_test_values(field, registry, sample)?;
        let allow_null = field.nullable && !self.is_non_null(&field.name);
        if allow_null {
            Ok(values)
        } else {
            Ok(values.into_iter().filter(|v| !v.is_null()).collect())
        }
    }

    fn resolve_test_values(
        &self,
        field: &FieldRef,
        registry: &TypeRegistry,
        sample: &Record,
    ) -> Result<Vec<Value>, CatalogError> {
        if let Some(values) = self.test_by_field.get(&field.name) {
            return Ok(values.clone());
        }
        let label = field.r#type.label();
        if let Some(values) = self.test_by_type.get(&label) {
            return Ok(values.clone());
        }
        if let Some(values) = self.generate_test_values(&field.r#type, registry) {
            return Ok(values);
        }
        if field.r#type.is_enum() {
            // unconfigured enum seen mid-resolution: derive the range
            // without registering it.
            if let FieldType::Enum { values, .. } = &field.r#type {
                return Ok(self.enum_value_range(values).0);
            }
        }
        if matches!(field.r#type, FieldType::List { .. }) {
            return self.synthesize_collections(field, sample);
        }
        Err(CatalogError::NoTestData(label))
    }

    /// generating-type tier: the first registered type whose every value
    /// constructs an instance of the requested type wins.
    fn generate_test_values(&self, target: &FieldType, registry: &TypeRegistry) -> Option<Vec<Value>> {
        let target_label = target.label();
        for (label, generating) in &self.shapes {
            if *label == target_label {
                continue;
            }
            let Some(values) = self.test_by_type.get(label) else {
                continue;
            };
            let constructed: Result<Vec<Value>, _> = values
                .iter()
                .map(|v| registry.construct(target, generating, v))
                .collect();
            if let Ok(constructed) = constructed {
                return Some(constructed);
            }
        }
        None
    }

    /// collection tier: one singleton per element test value, one empty
    /// collection, one collection of all element values.
    fn synthesize_collections(
        &self,
        field: &FieldRef,
        sample: &Record,
    ) -> Result<Vec<Value>, CatalogError> {
        let element = self
            .element_type_for(field, sample)?
            .ok_or_else(|| CatalogError::NoTestData(field.r#type.label()))?;
        let element_values = self.test_values_for_element(&element)?;
        let mut collections: Vec<Value> = element_values
            .iter()
            .map(|v| Value::Array(vec![v.clone()]))
            .collect();
        collections.push(Value::Array(Vec::new()));
        collections.push(Value::Array(element_values));
        Ok(collections)
    }

    fn test_values_for_element(&self, element: &FieldType) -> Result<Vec<Value>, CatalogError> {
        if let Some(values) = self.test_by_type.get(&element.label()) {
            return Ok(values.clone());
        }
        if let FieldType::Enum { values, .. } = element {
            return Ok(self.enum_value_range(values).0);
        }
        Err(CatalogError::NoTestData(element.label()))
    }

    /// resolve the single training value used to perturb a field during
    /// mapping inference. Same precedence as [`test_values_for`].
    pub fn training_value_for(
        &self,
        field: &FieldRef,
        registry: &TypeRegistry,
        sample: &Record,
    ) -> Result<Value, CatalogError> {
        if let Some(value) = self.training_by_field.get(&field.name) {
            return Ok(value.clone());
        }
        let label = field.r#type.label();
        if let Some(value) = self.training_by_type.get(&label) {
            return Ok(value.clone());
        }
        for (shape_label, generating) in &self.shapes {
            if *shape_label == label {
                continue;
            }
            let Some(value) = self.training_by_type.get(shape_label) else {
                continue;
            };
            if let Ok(constructed) = registry.construct(&field.r#type, generating, value) {
                // the whole generating range must construct, or the
                // test-value tier would disagree with this one.
                if self.generating_range_constructs(&field.r#type, generating, shape_label, registry)
                {
                    return Ok(constructed);
                }
            }
        }
        if let FieldType::Enum { values, .. } = &field.r#type {
            return Ok(self.enum_value_range(values).1);
        }
        if matches!(field.r#type, FieldType::List { .. }) {
            let element = self
                .element_type_for(field, sample)?
                .ok_or_else(|| CatalogError::NoTestData(label.clone()))?;
            let element_training = self.training_value_for_element(&element)?;
            return Ok(Value::Array(vec![element_training]));
        }
        Err(CatalogError::NoTestData(label))
    }

    fn training_value_for_element(&self, element: &FieldType) -> Result<Value, CatalogError> {
        if let Some(value) = self.training_by_type.get(&element.label()) {
            return Ok(value.clone());
        }
        if let FieldType::Enum { values, .. } = element {
            return Ok(self.enum_value_range(values).1);
        }
        Err(CatalogError::NoTestData(element.label()))
    }

    fn generating_range_constructs(
        &self,
        target: &FieldType,
        generating: &FieldType,
        label: &str,
        registry: &TypeRegistry,
    ) -> bool {
        self.test_by_type
            .get(label)
            .is_some_and(|values| {
                values
                    .iter()
                    .all(|v| registry.construct(target, generating, v).is_ok())
            })
    }
}

/// resolve a type label back to a field type; simple labels map to the
/// built-in shapes, `list<...>` recurses, anything else is custom.
pub(crate) fn parse_label(label: &str) -> FieldType {
    match label {
        "string" => FieldType::String,
        "int" => FieldType::Int,
        "long" => FieldType::Long,
        "float" => FieldType::Float,
        "bool" => FieldType::Bool,
        "date" => FieldType::Date,
        "datetime" => FieldType::Datetime,
        "json" => FieldType::Json,
        other => {
            if let Some(inner) = other.strip_prefix("list<").and_then(|s| s.strip_suffix('>')) {
                FieldType::List {
                    item: Box::new(parse_label(inner)),
                }
            } else {
                FieldType::Custom {
                    name: other.to_string(),
                }
            }
        }
    }
}
