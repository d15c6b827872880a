//! type registry: the registered construction and accessor capability
//! for composite types.

use crate::record::{infer_type, FieldType};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// errors raised by the construction and accessor capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("no suitable constructor for `{target}` taking `{param}`")]
    NoSuitableConstructor { target: String, param: String },
    #[error("constructor for `{target}` failed: {reason}")]
    ConstructorFailed { target: String, reason: String },
    #[error("accessor `{accessor}` failed: {reason}")]
    AccessorFailed { accessor: String, reason: String },
}

type ApplyFn = Box<dyn Fn(&Value) -> Result<Value, String>>;

/// single-argument constructor registered for a type.
pub struct Constructor {
    pub param: FieldType,
    make: ApplyFn,
}

/// zero-argument accessor member registered for a type.
pub struct Accessor {
    pub name: String,
    pub returns: FieldType,
    pub returns_nullable: bool,
    pub is_static: bool,
    call: ApplyFn,
}

impl Accessor {
    /// non-static accessor with a non-nullable return type.
    pub fn new(
        name: impl Into<String>,
        returns: FieldType,
        call: impl Fn(&Value) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            returns,
            returns_nullable: false,
            is_static: false,
            call: Box::new(call),
        }
    }

    /// mark the return type as nullable.
    pub fn nullable_return(mut self) -> Self {
        self.returns_nullable = true;
        self
    }

    /// mark the accessor as a static member.
    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// invoke the accessor on a value.
    pub fn invoke(&self, value: &Value) -> Result<Value, ConstructError> {
        (self.call)(value).map_err(|reason| ConstructError::AccessorFailed {
            accessor: self.name.clone(),
            reason,
        })
    }
}

/// registered definition of a composite type.
pub struct TypeDef {
    pub name: String,
    supertypes: BTreeSet<String>,
    constructors: Vec<Constructor>,
    accessors: Vec<Accessor>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: BTreeSet::new(),
            constructors: Vec::new(),
            accessors: Vec::new(),
        }
    }

    /// declare a label this type is assignable to.
    pub fn with_supertype(mut self, label: impl Into<String>) -> Self {
        self.supertypes.insert(label.into());
        self
    }

    /// register a single-argument constructor taking `param`.
    pub fn with_constructor(
        mut self,
        param: FieldType,
        make: impl Fn(&Value) -> Result<Value, String> + 'static,
    ) -> Self {
        self.constructors.push(Constructor {
            param,
            make: Box::new(make),
        });
        self
    }

    /// register an accessor member.
    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessors.push(accessor);
        self
    }

    /// accessors declared on this type.
    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    fn constructor_for(&self, param: &FieldType, value: &Value) -> Option<&Constructor> {
        if let Some(ctor) = self.constructors.iter().find(|c| c.param == *param) {
            return Some(ctor);
        }
        let runtime = infer_type(value)?;
        self.constructors.iter().find(|c| c.param == runtime)
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("supertypes", &self.supertypes)
            .field("constructors", &self.constructors.len())
            .field("accessors", &self.accessors.len())
            .finish()
    }
}

/// registry of composite type definitions, keyed by type label.
#[derive(Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a type definition, replacing any existing one.
    pub fn register(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    /// fluent registration.
    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.register(def);
        self
    }

    /// look up a type definition by label.
    pub fn type_def(&self, label: &str) -> Option<&TypeDef> {
        self.types.get(label)
    }

    /// return true when a value of the source shape can be assigned to the
    /// target shape unchanged.
    ///
    /// `Json` is the top type and accepts everything. Otherwise types must
    /// match (or the source must declare the target as a supertype) and a
    /// non-nullable target rejects a nullable source.
    pub fn accepts(&self, target: (&FieldType, bool), source: (&FieldType, bool)) -> bool {
        let (target_ty, target_nullable) = target;
        let (source_ty, source_nullable) = source;
        if *target_ty == FieldType::Json {
            return true;
        }
        let nullability_ok = target_nullable || !source_nullable;
        if !nullability_ok {
            return false;
        }
        if target_ty == source_ty {
            return true;
        }
        self.types
            .get(&source_ty.label())
            .is_some_and(|def| def.supertypes.contains(&target_ty.label()))
    }

    /// return true when `target` has a single-argument constructor that
    /// would match the given parameter type or the value's runtime type.
    pub fn has_constructor(&self, target: &FieldType, param: &FieldType, value: &Value) -> bool {
        self.types
            .get(&target.label())
            .is_some_and(|def| def.constructor_for(param, value).is_some())
    }

    /// build an instance of `target` from a single argument.
    ///
    /// The constructor is matched on the declared parameter type first,
    /// then on the value's inferred runtime type. A null argument yields
    /// null without construction.
    pub fn construct(
        &self,
        target: &FieldType,
        param: &FieldType,
        value: &Value,
    ) -> Result<Value, ConstructError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let missing = || ConstructError::NoSuitableConstructor {
            target: target.label(),
            param: param.label(),
        };
        let def = self.types.get(&target.label()).ok_or_else(missing)?;
        let ctor = def.constructor_for(param, value).ok_or_else(missing)?;
        (ctor.make)(value).map_err(|reason| ConstructError::ConstructorFailed {
            target: target.label(),
            reason,
        })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn money() -> FieldType {
        FieldType::Custom { name: "money".into() }
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new().with_type(
            TypeDef::new("money")
                .with_supertype("asset")
                .with_constructor(FieldType::Long, |v| Ok(json!({ "cents": v })))
                .with_accessor(Accessor::new("get_cents", FieldType::Long, |v| {
                    v.get("cents").cloned().ok_or_else(|| "no cents".to_string())
                })),
        )
    }

    #[test]
    fn json_accepts_everything() {
        let registry = TypeRegistry::new();
        assert!(registry.accepts((&FieldType::Json, false), (&FieldType::Int, true)));
        assert!(registry.accepts((&FieldType::Json, false), (&money(), false)));
    }

    #[test]
    fn equal_types_respect_nullability() {
        let registry = TypeRegistry::new();
        // unboxed -> boxed widens
        assert!(registry.accepts((&FieldType::Int, true), (&FieldType::Int, false)));
        // boxed -> unboxed does not
        assert!(!registry.accepts((&FieldType::Int, false), (&FieldType::Int, true)));
        assert!(!registry.accepts((&FieldType::Int, false), (&FieldType::Long, false)));
    }

    #[test]
    fn supertype_assignment() {
        let registry = registry();
        let asset = FieldType::Custom { name: "asset".into() };
        assert!(registry.accepts((&asset, false), (&money(), false)));
        assert!(!registry.accepts((&money(), false), (&asset, false)));
    }

    #[test]
    fn construct_by_declared_param() {
        let registry = registry();
        let built = registry
            .construct(&money(), &FieldType::Long, &json!(125))
            .unwrap();
        assert_eq!(built, json!({ "cents": 125 }));
    }

    #[test]
    fn construct_by_runtime_type() {
        let registry = registry();
        // declared param doesn't match; the value's runtime type does.
        let built = registry
            .construct(&money(), &FieldType::Json, &json!(5_000_000_000i64))
            .unwrap();
        assert_eq!(built, json!({ "cents": 5_000_000_000i64 }));
    }

    #[test]
    fn construct_without_matching_param_fails() {
        let registry = registry();
        let err = registry
            .construct(&money(), &FieldType::String, &json!("125"))
            .unwrap_err();
        assert!(matches!(err, ConstructError::NoSuitableConstructor { .. }));
    }

    #[test]
    fn construct_null_yields_null() {
        let registry = registry();
        let built = registry
            .construct(&money(), &FieldType::Long, &Value::Null)
            .unwrap();
        assert_eq!(built, Value::Null);
    }

    #[test]
    fn construct_unknown_target_fails() {
        let registry = TypeRegistry::new();
        let err = registry
            .construct(&money(), &FieldType::Long, &json!(1))
            .unwrap_err();
        assert_eq!(
            err,
            ConstructError::NoSuitableConstructor {
                target: "money".into(),
                param: "long".into()
            }
        );
    }

    #[test]
    fn accessor_invocation() {
        let registry = registry();
        let def = registry.type_def("money").unwrap();
        let accessor = &def.accessors()[0];
        assert_eq!(accessor.invoke(&json!({ "cents": 7 })).unwrap(), json!(7));
        assert!(accessor.invoke(&json!({})).is_err());
    }
}
