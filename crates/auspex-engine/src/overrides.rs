//! explicit expected-value overrides, consulted before the oracle.

use serde_json::Value;
use std::fmt;

enum Expected {
    Literal(Value),
    Transform(Box<dyn Fn(&Value) -> Result<Value, String>>),
}

/// declared expected value (or transform) for a (source field, target
/// field) pair, optionally guarded by a specific source value.
pub struct OverrideMapping {
    pub source_field: String,
    pub target_field: String,
    /// when present, the override applies only to this exact source
    /// value (null guards match null); when absent, to every value.
    pub guard: Option<Value>,
    expected: Expected,
}

impl OverrideMapping {
    /// override with a literal expected value.
    pub fn literal(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        expected: Value,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            guard: None,
            expected: Expected::Literal(expected),
        }
    }

    /// override computing the expected value from the source value.
    pub fn transform(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        transform: impl Fn(&Value) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            guard: None,
            expected: Expected::Transform(Box::new(transform)),
        }
    }

    /// restrict the override to a single source value.
    pub fn for_value(mut self, guard: Value) -> Self {
        self.guard = Some(guard);
        self
    }

    fn matches(&self, source_field: &str, target_field: &str, source_value: &Value) -> bool {
        self.source_field == source_field
            && self.target_field == target_field
            && self.guard.as_ref().map_or(true, |g| g == source_value)
    }

    fn expected_for(&self, source_value: &Value) -> Result<Value, String> {
        match &self.expected {
            Expected::Literal(value) => Ok(value.clone()),
            Expected::Transform(transform) => transform(source_value),
        }
    }
}

impl fmt::Debug for OverrideMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideMapping")
            .field("source_field", &self.source_field)
            .field("target_field", &self.target_field)
            .field("guard", &self.guard)
            .finish()
    }
}

/// overrides registered for one verification session; first match wins.
#[derive(Default)]
pub struct OverrideRegistry {
    entries: Vec<OverrideMapping>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mapping: OverrideMapping) {
        self.entries.push(mapping);
    }

    /// expected value for the pair and source value, when an override is
    /// declared for it.
    pub fn expected_for(
        &self,
        source_field: &str,
        target_field: &str,
        source_value: &Value,
    ) -> Option<Result<Value, String>> {
        self.entries
            .iter()
            .find(|entry| entry.matches(source_field, target_field, source_value))
            .map(|entry| entry.expected_for(source_value))
    }
}

impl fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}
