//! catalog document loading (yaml or json).

use crate::catalog::parse_label;
use crate::verifier::MapperCheck;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// test values plus the training value for one field or type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueRange {
    test_values: Vec<Value>,
    training_value: Value,
}

/// on-disk catalog configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    #[serde(default)]
    fields: BTreeMap<String, ValueRange>,
    #[serde(default)]
    types: BTreeMap<String, ValueRange>,
    #[serde(default)]
    non_null_fields: Vec<String>,
    #[serde(default)]
    ignored_enum_names: Vec<String>,
    #[serde(default)]
    excluded_target_fields: Vec<String>,
}

impl CatalogDocument {
    /// fold the document onto a verification session.
    pub fn apply<'s>(self, mut check: MapperCheck<'s>) -> MapperCheck<'s> {
        for (label, range) in self.types {
            check = check.with_test_and_training_values_for_type(
                &parse_label(&label),
                range.test_values,
                range.training_value,
            );
        }
        for (name, range) in self.fields {
            check = check.with_test_and_training_values_for_field(
                name,
                range.test_values,
                range.training_value,
            );
        }
        for name in self.non_null_fields {
            check = check.with_non_null_field(name);
        }
        check = check.with_ignored_enum_names(self.ignored_enum_names);
        check.excluding_target_fields(self.excluded_target_fields)
    }
}

/// load a catalog document (yaml or json by extension).
pub fn load_catalog(path: impl AsRef<Path>) -> Result<CatalogDocument> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("read catalog: {}", path.display()))?;
    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("parse json catalog: {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("parse yaml catalog: {}", path.display()))
    }
}
