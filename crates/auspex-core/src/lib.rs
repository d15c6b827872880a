//! core record model and field primitives for auspex.

pub mod fields;
pub mod record;
pub mod registry;

pub use fields::{fields_of, fields_of_type, FieldRef};
pub use record::{
    infer_type, value_type_label, FieldSchema, FieldType, JsonMap, Record, Schema, SchemaError,
    TypeSchema, TypeSchemaBuilder,
};
pub use registry::{Accessor, ConstructError, Constructor, TypeDef, TypeRegistry};
