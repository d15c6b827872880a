//! registered value converters, keyed by (source type, target type).

use auspex_core::FieldType;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// directionally significant (source type, target type) lookup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypePair {
    pub source: String,
    pub target: String,
}

impl TypePair {
    pub fn new(source: &FieldType, target: &FieldType) -> Self {
        Self {
            source: source.label(),
            target: target.label(),
        }
    }

    pub fn from_labels(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for TypePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// a registered value conversion.
pub struct Converter {
    apply: Box<dyn Fn(&Value) -> Result<Value, String>>,
}

impl Converter {
    /// converter from an arbitrary fallible transform.
    pub fn new(apply: impl Fn(&Value) -> Result<Value, String> + 'static) -> Self {
        Self {
            apply: Box::new(apply),
        }
    }

    /// converter defined by position-wise (source value, target value)
    /// lists; inputs outside the source list are rejected.
    pub fn from_pairs(source_values: Vec<Value>, target_values: Vec<Value>) -> Self {
        Self::new(move |value| {
            source_values
                .iter()
                .position(|candidate| candidate == value)
                .and_then(|index| target_values.get(index).cloned())
                .ok_or_else(|| format!("no conversion has been defined for value {value}"))
        })
    }

    /// apply the conversion.
    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        (self.apply)(value)
    }
}

/// stock converter for the 32-bit to 64-bit integer widening; values pass
/// through unchanged, null is preserved, anything outside the 32-bit range
/// is rejected.
pub fn int_to_long() -> Converter {
    Converter::new(|value| match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) => Ok(value.clone()),
            _ => Err(format!("{value} is not a 32-bit integer")),
        },
        other => Err(format!("{other} is not a 32-bit integer")),
    })
}

/// converters registered for one verification session.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: BTreeMap<TypePair, Converter>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a converter, replacing any existing one for the pair.
    pub fn insert(&mut self, pair: TypePair, converter: Converter) {
        self.converters.insert(pair, converter);
    }

    /// look up a converter for a type pair.
    pub fn get(&self, pair: &TypePair) -> Option<&Converter> {
        self.converters.get(pair)
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("pairs", &self.converters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_lookup_is_directional() {
        let mut registry = ConverterRegistry::new();
        registry.insert(
            TypePair::new(&FieldType::Int, &FieldType::Long),
            int_to_long(),
        );
        assert!(registry
            .get(&TypePair::from_labels("int", "long"))
            .is_some());
        assert!(registry
            .get(&TypePair::from_labels("long", "int"))
            .is_none());
    }

    #[test]
    fn from_pairs_maps_by_position() {
        let converter = Converter::from_pairs(
            vec![json!("A"), json!("B"), Value::Null],
            vec![json!(1), json!(2), Value::Null],
        );
        assert_eq!(converter.apply(&json!("B")).unwrap(), json!(2));
        assert_eq!(converter.apply(&Value::Null).unwrap(), Value::Null);
        assert!(converter.apply(&json!("C")).is_err());
    }

    #[test]
    fn int_to_long_preserves_values_and_null() {
        let converter = int_to_long();
        assert_eq!(converter.apply(&json!(i32::MIN)).unwrap(), json!(i32::MIN));
        assert_eq!(converter.apply(&Value::Null).unwrap(), Value::Null);
        assert!(converter.apply(&json!(i64::MAX)).is_err());
        assert!(converter.apply(&json!("x")).is_err());
    }
}
