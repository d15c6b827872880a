//! dynamic record model: field types, schemas, and record instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// attribute map backing a record instance.
pub type JsonMap = BTreeMap<String, Value>;

/// errors raised while resolving schema information.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown record type: {0}")]
    UnknownType(String),
    #[error("cyclic extends chain at type: {0}")]
    CyclicExtends(String),
}

/// declared type of a record field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Long,
    Float,
    Bool,
    Date,
    Datetime,
    /// the top type; accepts any value.
    Json,
    /// named enumeration with ordered symbolic members.
    Enum { name: String, values: Vec<String> },
    /// collection with a declared element type; `Json` as the item type
    /// means the element type is unknown and must be hinted or sampled.
    List { item: Box<FieldType> },
    /// registered composite type; behavior lives in the type registry.
    Custom { name: String },
}

impl FieldType {
    /// canonical label used as a catalog / converter key.
    pub fn label(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Datetime => "datetime".to_string(),
            FieldType::Json => "json".to_string(),
            FieldType::Enum { name, .. } => name.clone(),
            FieldType::List { item } => format!("list<{}>", item.label()),
            FieldType::Custom { name } => name.clone(),
        }
    }

    /// return true for the textual type.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String)
    }

    /// return true for enumeration types.
    pub fn is_enum(&self) -> bool {
        matches!(self, FieldType::Enum { .. })
    }

    /// return true for the bounded numeric families.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Long | FieldType::Float)
    }

    /// zero value used when constructing a non-nullable field.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Int | FieldType::Long => Value::from(0),
            FieldType::Float => Value::from(0.0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Date => Value::String("1970-01-01".to_string()),
            FieldType::Datetime => Value::String("1970-01-01T00:00:00Z".to_string()),
            FieldType::Json => Value::Null,
            FieldType::Enum { values, .. } => values
                .first()
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null),
            FieldType::List { .. } => Value::Array(Vec::new()),
            FieldType::Custom { .. } => Value::Null,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// infer the runtime field type of a value, where one is unambiguous.
pub fn infer_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::String(_) => Some(FieldType::String),
        Value::Bool(_) => Some(FieldType::Bool),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
                    Some(FieldType::Int)
                } else {
                    Some(FieldType::Long)
                }
            } else {
                Some(FieldType::Float)
            }
        }
        Value::Object(_) => Some(FieldType::Json),
        Value::Null | Value::Array(_) => None,
    }
}

/// short label for a runtime value shape, used in diagnostics.
pub fn value_type_label(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// declared schema for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(flatten)]
    pub r#type: FieldType,
    /// nullable fields model the boxed shape of a type; non-nullable
    /// fields model the primitive shape.
    #[serde(default)]
    pub nullable: bool,
    /// compile-time-constant member; skipped by the field model.
    #[serde(default)]
    pub constant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSchema {
    /// non-nullable field of the given type.
    pub fn of(r#type: FieldType) -> Self {
        Self {
            r#type,
            nullable: false,
            constant: false,
            description: None,
        }
    }

    /// nullable field of the given type.
    pub fn nullable(r#type: FieldType) -> Self {
        Self {
            r#type,
            nullable: true,
            constant: false,
            description: None,
        }
    }

    /// mark this field as a constant member.
    pub fn as_constant(mut self) -> Self {
        self.constant = true;
        self
    }
}

/// declared schema for a record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// ancestor type whose fields are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,
}

/// the registered universe of record types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub types: BTreeMap<String, TypeSchema>,
}

impl Schema {
    /// create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// register a type schema under `name`.
    pub fn with_type(mut self, name: impl Into<String>, type_schema: TypeSchema) -> Self {
        self.types.insert(name.into(), type_schema);
        self
    }

    /// look up a type schema, failing on unknown names.
    pub fn type_schema(&self, name: &str) -> Result<&TypeSchema, SchemaError> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }
}

/// builder for a [`TypeSchema`].
#[derive(Debug, Clone, Default)]
pub struct TypeSchemaBuilder {
    schema: TypeSchema,
}

impl TypeSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.schema.extends = Some(parent.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.schema.fields.insert(name.into(), field);
        self
    }

    pub fn build(self) -> TypeSchema {
        self.schema
    }
}

/// a record instance: a type name plus an attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub type_name: String,
    #[serde(default)]
    pub attrs: JsonMap,
}

impl Record {
    /// empty record of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attrs: JsonMap::new(),
        }
    }

    /// construct a default instance: nullable fields start at null,
    /// non-nullable fields at their zero value.
    pub fn fresh(schema: &Schema, type_name: &str) -> Result<Self, SchemaError> {
        let mut record = Record::new(type_name);
        let mut current = Some(type_name.to_string());
        let mut seen = Vec::new();
        while let Some(name) = current {
            if seen.contains(&name) {
                return Err(SchemaError::CyclicExtends(name));
            }
            let type_schema = schema.type_schema(&name)?;
            for (field_name, field) in &type_schema.fields {
                if record.attrs.contains_key(field_name) {
                    continue;
                }
                let value = if field.nullable {
                    Value::Null
                } else {
                    field.r#type.zero_value()
                };
                record.attrs.insert(field_name.clone(), value);
            }
            seen.push(name);
            current = type_schema.extends.clone();
        }
        Ok(record)
    }

    /// read a field value; absent attributes read as null.
    pub fn get(&self, field_name: &str) -> &Value {
        self.attrs.get(field_name).unwrap_or(&Value::Null)
    }

    /// write a field value.
    pub fn set(&mut self, field_name: impl Into<String>, value: Value) {
        self.attrs.insert(field_name.into(), value);
    }
}
