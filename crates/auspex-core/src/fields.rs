//! field model: enumerating the testable fields of a record.

use crate::record::{FieldType, Record, Schema, SchemaError};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// naming-convention prefixes emitted by generated persistence code;
/// fields matching these are descriptor noise, not data.
const NOISE_PREFIXES: &str = "^(COL_|ATT_|ENTITY_|TABLE_)";

fn noise_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NOISE_PREFIXES).expect("valid noise prefix pattern"))
}

/// reference to a declared field of a record type.
///
/// Identity (equality, ordering, map keys) is `(declared_by, name)`.
#[derive(Debug, Clone)]
pub struct FieldRef {
    pub name: String,
    /// type that declares this field (the record type or an ancestor).
    pub declared_by: String,
    pub r#type: FieldType,
    pub nullable: bool,
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.declared_by == other.declared_by && self.name == other.name
    }
}

impl Eq for FieldRef {}

impl PartialOrd for FieldRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldRef {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.declared_by, &self.name).cmp(&(&other.declared_by, &other.name))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declared_by, self.name)
    }
}

/// enumerate the testable fields of a record instance.
///
/// Walks the record's type and its `extends` ancestry; nearer declarations
/// shadow ancestors. Constant members and generated-persistence noise
/// fields are excluded. Order is stable (alphabetical by field name).
pub fn fields_of(schema: &Schema, record: &Record) -> Result<Vec<FieldRef>, SchemaError> {
    fields_of_type(schema, &record.type_name)
}

/// enumerate the testable fields of a record type by name.
pub fn fields_of_type(schema: &Schema, type_name: &str) -> Result<Vec<FieldRef>, SchemaError> {
    let mut collected: BTreeMap<String, FieldRef> = BTreeMap::new();
    let mut current = Some(type_name.to_string());
    let mut seen = Vec::new();

    while let Some(name) = current {
        if seen.contains(&name) {
            return Err(SchemaError::CyclicExtends(name));
        }
        let type_schema = schema.type_schema(&name)?;
        for (field_name, field) in &type_schema.fields {
            if collected.contains_key(field_name) {
                continue;
            }
            if field.constant || noise_pattern().is_match(field_name) {
                continue;
            }
            collected.insert(
                field_name.clone(),
                FieldRef {
                    name: field_name.clone(),
                    declared_by: name.clone(),
                    r#type: field.r#type.clone(),
                    nullable: field.nullable,
                },
            );
        }
        seen.push(name);
        current = type_schema.extends.clone();
    }

    Ok(collected.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldSchema, TypeSchemaBuilder};

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                "base",
                TypeSchemaBuilder::new()
                    .field("id", FieldSchema::of(FieldType::Long))
                    .field("TABLE_NAME", FieldSchema::of(FieldType::String))
                    .build(),
            )
            .with_type(
                "entity",
                TypeSchemaBuilder::new()
                    .extends("base")
                    .field("name", FieldSchema::of(FieldType::String))
                    .field("COL_NAME", FieldSchema::of(FieldType::String))
                    .field(
                        "schema_version",
                        FieldSchema::of(FieldType::Int).as_constant(),
                    )
                    .build(),
            )
    }

    #[test]
    fn collects_declared_and_inherited_fields() {
        let fields = fields_of_type(&schema(), "entity").unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn records_declaring_type() {
        let fields = fields_of_type(&schema(), "entity").unwrap();
        let id = fields.iter().find(|f| f.name == "id").unwrap();
        assert_eq!(id.declared_by, "base");
        let name = fields.iter().find(|f| f.name == "name").unwrap();
        assert_eq!(name.declared_by, "entity");
    }

    #[test]
    fn filters_constants_and_noise_prefixes() {
        let fields = fields_of_type(&schema(), "entity").unwrap();
        assert!(fields.iter().all(|f| f.name != "schema_version"));
        assert!(fields.iter().all(|f| f.name != "COL_NAME"));
        assert!(fields.iter().all(|f| f.name != "TABLE_NAME"));
    }

    #[test]
    fn order_is_stable() {
        let first = fields_of_type(&schema(), "entity").unwrap();
        let second = fields_of_type(&schema(), "entity").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn identity_is_name_and_declaring_type() {
        let a = FieldRef {
            name: "x".into(),
            declared_by: "t".into(),
            r#type: FieldType::Int,
            nullable: false,
        };
        let b = FieldRef {
            name: "x".into(),
            declared_by: "t".into(),
            r#type: FieldType::Long,
            nullable: true,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn cyclic_extends_is_rejected() {
        let schema = Schema::new()
            .with_type("a", TypeSchemaBuilder::new().extends("b").build())
            .with_type("b", TypeSchemaBuilder::new().extends("a").build());
        assert!(matches!(
            fields_of_type(&schema, "a"),
            Err(SchemaError::CyclicExtends(_))
        ));
    }
}
