//! type-directed value oracle: predicts the value a correct mapper
//! should have produced for a given source value and type pair.

use crate::converters::{ConverterRegistry, TypePair};
use auspex_core::{value_type_label, Accessor, ConstructError, FieldType, TypeRegistry};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// accessor-like member names preferred by the getter strategy.
const ACCESSOR_NAMES: &str = "^(get.*|.*value.*|.*Value.*)$";

fn accessor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ACCESSOR_NAMES).expect("valid accessor name pattern"))
}

/// errors raised when no expected value can be computed.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no applicable mapping strategy for `{src}` -> `{target}`")]
    NoStrategy { src: String, target: String },
    #[error("no member named `{name}` in enum `{target}`")]
    NoSuchEnumMember { name: String, target: String },
    #[error("expected a {expected} value for `{ty}`, got {actual}")]
    InvalidValue {
        expected: String,
        ty: String,
        actual: String,
    },
    #[error("converter for `{pair}` failed: {reason}")]
    ConverterFailed { pair: TypePair, reason: String },
    #[error("collection element {index} could not be mapped")]
    Element {
        index: usize,
        #[source]
        cause: Box<OracleError>,
    },
    #[error(transparent)]
    Construct(#[from] ConstructError),
}

/// conversion strategies in precedence order; the first applicable
/// strategy decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Registered,
    Collection,
    Identity,
    EnumToEnum,
    StringToEnum,
    EnumToString,
    Constructor,
    Getter,
    Unbox,
}

/// fixed precedence; new strategies are appended, never interleaved.
const CHAIN: [Strategy; 9] = [
    Strategy::Registered,
    Strategy::Collection,
    Strategy::Identity,
    Strategy::EnumToEnum,
    Strategy::StringToEnum,
    Strategy::EnumToString,
    Strategy::Constructor,
    Strategy::Getter,
    Strategy::Unbox,
];

struct Conversion<'a> {
    value: &'a Value,
    source_ty: &'a FieldType,
    source_nullable: bool,
    target_ty: &'a FieldType,
    target_nullable: bool,
    source_element: Option<&'a FieldType>,
    target_element: Option<&'a FieldType>,
}

/// the value oracle for one verification session.
pub struct Oracle<'a> {
    registry: &'a TypeRegistry,
    converters: &'a ConverterRegistry,
}

impl<'a> Oracle<'a> {
    pub fn new(registry: &'a TypeRegistry, converters: &'a ConverterRegistry) -> Self {
        Self {
            registry,
            converters,
        }
    }

    /// compute the value a correct mapper should produce for
    /// `source_value` when mapping a source field of the given shape to a
    /// target field of the given shape. `(type, nullable)` pairs carry
    /// the boxed/unboxed distinction; element types apply to collection
    /// fields. `field_non_null` suppresses evaluation for null inputs
    /// when the field is declared non-null-only.
    pub fn expected_value(
        &self,
        source_value: &Value,
        source: (&FieldType, bool),
        target: (&FieldType, bool),
        source_element: Option<&FieldType>,
        target_element: Option<&FieldType>,
        field_non_null: bool,
    ) -> Result<Value, OracleError> {
        if source_value.is_null() && field_non_null {
            return Ok(Value::Null);
        }
        let conversion = Conversion {
            value: source_value,
            source_ty: source.0,
            source_nullable: source.1,
            target_ty: target.0,
            target_nullable: target.1,
            source_element,
            target_element,
        };
        for strategy in CHAIN {
            if self.applies(strategy, &conversion) {
                return self.apply(strategy, &conversion);
            }
        }
        Err(OracleError::NoStrategy {
            src: conversion.source_ty.label(),
            target: conversion.target_ty.label(),
        })
    }

    fn applies(&self, strategy: Strategy, cx: &Conversion<'_>) -> bool {
        match strategy {
            Strategy::Registered => self
                .converters
                .get(&TypePair::new(cx.source_ty, cx.target_ty))
                .is_some(),
            Strategy::Collection => {
                matches!(cx.source_ty, FieldType::List { .. })
                    && matches!(cx.target_ty, FieldType::List { .. })
            }
            Strategy::Identity => self.registry.accepts(
                (cx.target_ty, cx.target_nullable),
                (cx.source_ty, cx.source_nullable),
            ),
            Strategy::EnumToEnum => cx.source_ty.is_enum() && cx.target_ty.is_enum(),
            Strategy::StringToEnum => cx.source_ty.is_textual() && cx.target_ty.is_enum(),
            Strategy::EnumToString => cx.source_ty.is_enum() && cx.target_ty.is_textual(),
            Strategy::Constructor => {
                self.registry
                    .has_constructor(cx.target_ty, cx.source_ty, cx.value)
            }
            Strategy::Getter => self.find_accessor(cx).is_some(),
            Strategy::Unbox => {
                cx.source_ty == cx.target_ty
                    && cx.source_ty.is_numeric()
                    && cx.source_nullable != cx.target_nullable
            }
        }
    }

    fn apply(&self, strategy: Strategy, cx: &Conversion<'_>) -> Result<Value, OracleError> {
        match strategy {
            Strategy::Registered => {
                let pair = TypePair::new(cx.source_ty, cx.target_ty);
                let converter = self.converters.get(&pair).expect("checked by applies");
                converter
                    .apply(cx.value)
                    .map_err(|reason| OracleError::ConverterFailed { pair, reason })
            }
            Strategy::Collection => self.map_collection(cx),
            Strategy::Identity | Strategy::Unbox => Ok(cx.value.clone()),
            Strategy::EnumToEnum | Strategy::StringToEnum => {
                self.member_by_name(cx.value, cx.source_ty, cx.target_ty)
            }
            Strategy::EnumToString => match cx.value {
                Value::Null => Ok(Value::Null),
                Value::String(_) => Ok(cx.value.clone()),
                other => Err(OracleError::InvalidValue {
                    expected: "enum member".to_string(),
                    ty: cx.source_ty.label(),
                    actual: value_type_label(other),
                }),
            },
            Strategy::Constructor => self
                .registry
                .construct(cx.target_ty, cx.source_ty, cx.value)
                .map_err(OracleError::from),
            Strategy::Getter => {
                if cx.value.is_null() {
                    return Ok(Value::Null);
                }
                let accessor = self.find_accessor(cx).expect("checked by applies");
                accessor.invoke(cx.value).map_err(OracleError::from)
            }
        }
    }

    /// element-wise recursion over a collection value; null passes
    /// through, element failures surface with their index.
    fn map_collection(&self, cx: &Conversion<'_>) -> Result<Value, OracleError> {
        let elements = match cx.value {
            Value::Null => return Ok(Value::Null),
            Value::Array(elements) => elements,
            other => {
                return Err(OracleError::InvalidValue {
                    expected: "array".to_string(),
                    ty: cx.source_ty.label(),
                    actual: value_type_label(other),
                })
            }
        };
        let source_element = cx
            .source_element
            .cloned()
            .or_else(|| declared_item(cx.source_ty))
            .unwrap_or(FieldType::Json);
        let target_element = cx
            .target_element
            .cloned()
            .or_else(|| declared_item(cx.target_ty))
            .unwrap_or(FieldType::Json);

        let mut mapped = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let expected = self
                .expected_value(
                    element,
                    (&source_element, true),
                    (&target_element, true),
                    None,
                    None,
                    false,
                )
                .map_err(|cause| OracleError::Element {
                    index,
                    cause: Box::new(cause),
                })?;
            mapped.push(expected);
        }
        Ok(Value::Array(mapped))
    }

    /// resolve a symbolic member name against the target enum.
    fn member_by_name(
        &self,
        value: &Value,
        source_ty: &FieldType,
        target_ty: &FieldType,
    ) -> Result<Value, OracleError> {
        let FieldType::Enum { values, .. } = target_ty else {
            unreachable!("checked by applies");
        };
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(name) => {
                if values.contains(name) {
                    Ok(Value::String(name.clone()))
                } else {
                    Err(OracleError::NoSuchEnumMember {
                        name: name.clone(),
                        target: target_ty.label(),
                    })
                }
            }
            other => Err(OracleError::InvalidValue {
                expected: "symbolic name".to_string(),
                ty: source_ty.label(),
                actual: value_type_label(other),
            }),
        }
    }

    /// find a non-static accessor on the source type whose return type
    /// is assignable to the target; accessor-like names are preferred. A
    /// boxed numeric target retries as its primitive form.
    fn find_accessor(&self, cx: &Conversion<'_>) -> Option<&Accessor> {
        let def = self.registry.type_def(&cx.source_ty.label())?;
        let mut shapes = vec![(cx.target_ty, cx.target_nullable)];
        if cx.target_nullable && cx.target_ty.is_numeric() {
            shapes.push((cx.target_ty, false));
        }
        for target in shapes {
            let candidates: Vec<&Accessor> = def
                .accessors()
                .iter()
                .filter(|a| !a.is_static)
                .filter(|a| {
                    self.registry
                        .accepts(target, (&a.returns, a.returns_nullable))
                })
                .collect();
            if let Some(preferred) = candidates
                .iter()
                .find(|a| accessor_pattern().is_match(&a.name))
                .copied()
            {
                return Some(preferred);
            }
            if let Some(first) = candidates.first().copied() {
                return Some(first);
            }
        }
        None
    }
}

fn declared_item(ty: &FieldType) -> Option<FieldType> {
    match ty {
        FieldType::List { item } => Some((**item).clone()),
        _ => None,
    }
}
