//! verifier orchestration and the fluent configuration surface.

use crate::catalog::{CatalogError, TestValueCatalog};
use crate::converters::{Converter, ConverterRegistry, TypePair};
use crate::learner::learn_mapping;
use crate::oracle::{Oracle, OracleError};
use crate::overrides::{OverrideMapping, OverrideRegistry};
use auspex_core::{fields_of, FieldType, Record, Schema, SchemaError, TypeDef, TypeRegistry};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// mapper under test.
pub type MapperFn<'a> = dyn Fn(&Record) -> anyhow::Result<Record> + 'a;
/// produces fresh source instances on demand.
pub type SourceFactory<'a> = dyn Fn() -> anyhow::Result<Record> + 'a;

/// failures raised by [`MapperCheck::verify`]; the first failure aborts
/// the run, nothing is retried.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unable to construct a source instance")]
    SourceConstruction(#[source] anyhow::Error),
    #[error("failed to create the target reference")]
    TargetConstruction(#[source] anyhow::Error),
    #[error("mapper failed while applying value {value} to field `{field}`")]
    Training {
        field: String,
        value: Value,
        #[source]
        cause: anyhow::Error,
    },
    #[error("source field `{source_field}` maps to more than one target field: [{}]", target_fields.join(", "))]
    AmbiguousMapping {
        source_field: String,
        target_fields: Vec<String>,
    },
    #[error("unmapped target fields: {}", fields.join(", "))]
    UncoveredTargetFields { fields: Vec<String> },
    #[error("mapping `{source_field}` -> `{target_field}`: expected {expected}, actual {actual}")]
    ValueMismatch {
        source_field: String,
        target_field: String,
        expected: Value,
        actual: Value,
    },
    #[error("override for `{source_field}` -> `{target_field}` failed: {reason}")]
    OverrideFailed {
        source_field: String,
        target_field: String,
        reason: String,
    },
    #[error("no expected value for `{source_field}` -> `{target_field}`")]
    Oracle {
        source_field: String,
        target_field: String,
        #[source]
        cause: OracleError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// one mapping-verification session.
///
/// Owns the catalog, type registry, converter registry, and override
/// registry for the session; all configuration happens before
/// [`verify`](Self::verify), which consumes the session.
pub struct MapperCheck<'a> {
    schema: &'a Schema,
    registry: TypeRegistry,
    catalog: TestValueCatalog,
    converters: ConverterRegistry,
    overrides: OverrideRegistry,
    excluded_target_fields: BTreeSet<String>,
}

impl<'a> MapperCheck<'a> {
    /// session over the given record schema, with the built-in test
    /// value ranges pre-registered.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            registry: TypeRegistry::new(),
            catalog: TestValueCatalog::with_defaults(),
            converters: ConverterRegistry::new(),
            overrides: OverrideRegistry::new(),
            excluded_target_fields: BTreeSet::new(),
        }
    }

    /// exclude target fields from the coverage check.
    pub fn excluding_target_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_target_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// register test values and a training value for a field name.
    pub fn with_test_and_training_values_for_field(
        mut self,
        field_name: impl Into<String>,
        test_values: Vec<Value>,
        training_value: Value,
    ) -> Self {
        self.catalog
            .set_values_for_field(field_name, test_values, training_value);
        self
    }

    /// register test values and a training value for all fields of a
    /// type.
    pub fn with_test_and_training_values_for_type(
        mut self,
        r#type: &FieldType,
        test_values: Vec<Value>,
        training_value: Value,
    ) -> Self {
        self.catalog
            .set_values_for_type(r#type, test_values, training_value);
        self
    }

    /// derive test and training values from an enum type's members.
    pub fn with_values_for_enum_type(mut self, r#type: &FieldType) -> Self {
        self.catalog.set_values_for_enum_type(r#type);
        self
    }

    /// use an enum's member names as the value range of a textual field.
    pub fn with_enum_names_as_test_values_for_field(
        mut self,
        field_name: impl Into<String>,
        r#type: &FieldType,
    ) -> Self {
        if let FieldType::Enum { values, .. } = r#type {
            let (test_values, training_value) = self.catalog.enum_value_range(values);
            self.catalog
                .set_values_for_field(field_name, test_values, training_value);
        }
        self
    }

    /// skip these member names when deriving enum value ranges.
    pub fn with_ignored_enum_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.catalog.ignore_enum_names(names);
        self
    }

    /// declare that a field never receives null; null is dropped from
    /// its value range.
    pub fn with_non_null_field(mut self, field_name: impl Into<String>) -> Self {
        self.catalog.mark_non_null(field_name);
        self
    }

    /// declare a collection field's element type explicitly.
    pub fn with_element_type(
        mut self,
        field_name: impl Into<String>,
        element_type: FieldType,
    ) -> Self {
        self.catalog.set_element_hint(field_name, element_type);
        self
    }

    /// register a custom value converter for a (source, target) type
    /// pair.
    pub fn with_converter(
        mut self,
        source: &FieldType,
        target: &FieldType,
        converter: Converter,
    ) -> Self {
        self.converters
            .insert(TypePair::new(source, target), converter);
        self
    }

    /// declare an explicit expected value for a field pair, bypassing
    /// the oracle.
    pub fn with_override(mut self, mapping: OverrideMapping) -> Self {
        self.overrides.push(mapping);
        self
    }

    /// register a composite type definition.
    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.registry.register(def);
        self
    }

    /// fold a catalog document from disk onto this session.
    pub fn with_catalog_file(self, path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(crate::loader::load_catalog(path)?.apply(self))
    }

    /// verify that the mapper maps every source field plausibly, using
    /// fresh instances from the source factory.
    pub fn verify<M, F>(self, mapper: M, source_factory: F) -> Result<(), VerifyError>
    where
        M: Fn(&Record) -> anyhow::Result<Record>,
        F: Fn() -> anyhow::Result<Record>,
    {
        self.run(&mapper, &source_factory)
    }

    /// verify with default-constructed source instances of the named
    /// type.
    pub fn verify_constructed<M>(self, mapper: M, source_type: &str) -> Result<(), VerifyError>
    where
        M: Fn(&Record) -> anyhow::Result<Record>,
    {
        let schema = self.schema;
        let type_name = source_type.to_string();
        self.verify(mapper, move || {
            Record::fresh(schema, &type_name).map_err(anyhow::Error::from)
        })
    }

    fn run(
        mut self,
        mapper: &MapperFn<'_>,
        source_factory: &SourceFactory<'_>,
    ) -> Result<(), VerifyError> {
        let source_reference = source_factory().map_err(VerifyError::SourceConstruction)?;
        let target_reference = mapper(&source_reference).map_err(VerifyError::TargetConstruction)?;
        debug!(
            source = %source_reference.type_name,
            target = %target_reference.type_name,
            "verifying mapper"
        );

        let source_fields = fields_of(self.schema, &source_reference)?;
        let target_fields = fields_of(self.schema, &target_reference)?;

        // enum source fields without configured values get their member
        // ranges registered before learning starts.
        for field in &source_fields {
            if field.r#type.is_enum() && !self.catalog.has_type_entry(&field.r#type.label()) {
                self.catalog.register_enum(&field.r#type);
            }
        }

        let learned = learn_mapping(
            mapper,
            source_factory,
            &source_reference,
            &target_reference,
            &source_fields,
            &target_fields,
            &self.catalog,
            &self.registry,
        )?;

        let unmapped: Vec<String> = target_fields
            .iter()
            .filter(|field| {
                !learned.changed_targets.contains(*field)
                    && !self.excluded_target_fields.contains(&field.name)
            })
            .map(|field| field.name.clone())
            .collect();
        if !unmapped.is_empty() {
            return Err(VerifyError::UncoveredTargetFields { fields: unmapped });
        }

        let oracle = Oracle::new(&self.registry, &self.converters);
        for (source_field, target_field) in &learned.pairs {
            debug!(source = %source_field, target = %target_field, "replaying test values");
            let values =
                self.catalog
                    .test_values_for(source_field, &self.registry, &source_reference)?;
            let source_element = self
                .catalog
                .element_type_for(source_field, &source_reference)?;
            let target_element = self
                .catalog
                .element_type_for(target_field, &target_reference)?;
            let non_null = self.catalog.is_non_null(&source_field.name);

            for value in values {
                let mut source = source_factory().map_err(VerifyError::SourceConstruction)?;
                source.set(source_field.name.clone(), value.clone());
                let target = mapper(&source).map_err(|cause| VerifyError::Training {
                    field: source_field.name.clone(),
                    value: value.clone(),
                    cause,
                })?;
                let actual = target.get(&target_field.name).clone();
                let source_value = source.get(&source_field.name).clone();

                let expected = match self.overrides.expected_for(
                    &source_field.name,
                    &target_field.name,
                    &source_value,
                ) {
                    Some(Ok(expected)) => expected,
                    Some(Err(reason)) => {
                        return Err(VerifyError::OverrideFailed {
                            source_field: source_field.name.clone(),
                            target_field: target_field.name.clone(),
                            reason,
                        })
                    }
                    None => oracle
                        .expected_value(
                            &source_value,
                            (&source_field.r#type, source_field.nullable),
                            (&target_field.r#type, target_field.nullable),
                            source_element.as_ref(),
                            target_element.as_ref(),
                            non_null,
                        )
                        .map_err(|cause| VerifyError::Oracle {
                            source_field: source_field.name.clone(),
                            target_field: target_field.name.clone(),
                            cause,
                        })?,
                };

                if actual != expected {
                    return Err(VerifyError::ValueMismatch {
                        source_field: source_field.name.clone(),
                        target_field: target_field.name.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }

        Ok(())
    }
}
