//! mapping learner: discovers the field-to-field correspondence by
//! perturbing one source field at a time and diffing the mapped output
//! against a frozen reference target.

use crate::catalog::TestValueCatalog;
use crate::verifier::{MapperFn, SourceFactory, VerifyError};
use auspex_core::{FieldRef, Record, TypeRegistry};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// the learned source-field to target-field association.
#[derive(Debug, Clone, Default)]
pub struct LearnedMapping {
    /// each source field maps to at most one target field.
    pub pairs: BTreeMap<FieldRef, FieldRef>,
    /// target fields observed to change under some perturbation.
    pub changed_targets: BTreeSet<FieldRef>,
}

/// learn the field mapping by setting each source field to its training
/// value, invoking the mapper, and collecting the target fields that
/// changed relative to the reference target.
///
/// A perturbation that changes more than one target field aborts with an
/// ambiguous-mapping failure before any value-level checks run.
#[allow(clippy::too_many_arguments)]
pub fn learn_mapping(
    mapper: &MapperFn<'_>,
    source_factory: &SourceFactory<'_>,
    source_reference: &Record,
    target_reference: &Record,
    source_fields: &[FieldRef],
    target_fields: &[FieldRef],
    catalog: &TestValueCatalog,
    registry: &TypeRegistry,
) -> Result<LearnedMapping, VerifyError> {
    let mut learned = LearnedMapping::default();

    for field in source_fields {
        let training = catalog.training_value_for(field, registry, source_reference)?;
        let changed = perturb(
            mapper,
            source_factory,
            target_reference,
            target_fields,
            field,
            &training,
        )?;

        if changed.len() > 1 {
            return Err(VerifyError::AmbiguousMapping {
                source_field: field.name.clone(),
                target_fields: changed.iter().map(|f| f.name.clone()).collect(),
            });
        }
        if let Some(target) = changed.into_iter().next() {
            debug!(source = %field, target = %target, "learned mapping");
            learned.changed_targets.insert(target.clone());
            learned.pairs.insert(field.clone(), target);
        } else {
            debug!(source = %field, "no mapping");
        }
    }

    Ok(learned)
}

/// apply one training perturbation and report the changed target fields.
fn perturb(
    mapper: &MapperFn<'_>,
    source_factory: &SourceFactory<'_>,
    target_reference: &Record,
    target_fields: &[FieldRef],
    field: &FieldRef,
    training: &Value,
) -> Result<BTreeSet<FieldRef>, VerifyError> {
    let mut source = source_factory().map_err(VerifyError::SourceConstruction)?;
    source.set(field.name.clone(), training.clone());
    let trial = mapper(&source).map_err(|cause| VerifyError::Training {
        field: field.name.clone(),
        value: training.clone(),
        cause,
    })?;
    Ok(changed_fields(target_fields, target_reference, &trial))
}

/// field-by-field diff using value equality; two nulls are equal, any
/// null-vs-non-null difference is a change.
pub(crate) fn changed_fields(
    target_fields: &[FieldRef],
    reference: &Record,
    trial: &Record,
) -> BTreeSet<FieldRef> {
    target_fields
        .iter()
        .filter(|field| reference.get(&field.name) != trial.get(&field.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auspex_core::{
        fields_of_type, FieldSchema, FieldType, Schema, TypeSchemaBuilder,
    };
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                "a",
                TypeSchemaBuilder::new()
                    .field("att1", FieldSchema::nullable(FieldType::String))
                    .field("att2", FieldSchema::nullable(FieldType::String))
                    .build(),
            )
            .with_type(
                "b",
                TypeSchemaBuilder::new()
                    .field("att1", FieldSchema::nullable(FieldType::String))
                    .build(),
            )
    }

    fn learn(
        mapper: impl Fn(&Record) -> anyhow::Result<Record>,
        source_type: &str,
        target_type: &str,
    ) -> Result<LearnedMapping, VerifyError> {
        let schema = schema();
        let catalog = TestValueCatalog::with_defaults();
        let registry = TypeRegistry::new();
        let factory = || Record::fresh(&schema, source_type).map_err(anyhow::Error::from);
        let source_reference = factory().unwrap();
        // for null-filled defaults a copy mapper reproduces the fresh
        // target, so the fresh instance serves as the frozen reference.
        let target_reference = Record::fresh(&schema, target_type).unwrap();
        let source_fields = fields_of_type(&schema, source_type).unwrap();
        let target_fields = fields_of_type(&schema, target_type).unwrap();
        learn_mapping(
            &mapper,
            &factory,
            &source_reference,
            &target_reference,
            &source_fields,
            &target_fields,
            &catalog,
            &registry,
        )
    }

    #[test]
    fn learns_one_to_one_mapping() {
        let learned = learn(
            |a| {
                let mut b = Record::new("b");
                b.set("att1", a.get("att1").clone());
                Ok(b)
            },
            "a",
            "b",
        )
        .unwrap();
        assert_eq!(learned.pairs.len(), 1);
        let (source, target) = learned.pairs.iter().next().unwrap();
        assert_eq!(source.name, "att1");
        assert_eq!(target.name, "att1");
    }

    #[test]
    fn unchanged_source_fields_record_no_mapping() {
        let learned = learn(|_| Ok(Record::new("b")), "a", "b").unwrap();
        assert!(learned.pairs.is_empty());
        assert!(learned.changed_targets.is_empty());
    }

    #[test]
    fn fan_out_is_ambiguous() {
        let err = learn(
            |b| {
                let mut a = Record::new("a");
                a.set("att1", b.get("att1").clone());
                a.set("att2", b.get("att1").clone());
                Ok(a)
            },
            "b",
            "a",
        )
        .unwrap_err();
        match err {
            VerifyError::AmbiguousMapping {
                source_field,
                target_fields,
            } => {
                assert_eq!(source_field, "att1");
                assert_eq!(target_fields, vec!["att1".to_string(), "att2".to_string()]);
            }
            other => panic!("expected ambiguous mapping, got {other}"),
        }
    }

    #[test]
    fn mapper_failure_becomes_training_failure() {
        let err = learn(
            |_| Err(anyhow::anyhow!("mapper exploded")),
            "a",
            "b",
        )
        .unwrap_err();
        match err {
            VerifyError::Training { field, value, .. } => {
                assert_eq!(field, "att1");
                assert_eq!(value, json!("A test string."));
            }
            other => panic!("expected training failure, got {other}"),
        }
    }

    #[test]
    fn diff_treats_two_nulls_as_equal() {
        let schema = schema();
        let target_fields = fields_of_type(&schema, "a").unwrap();
        let reference = Record::fresh(&schema, "a").unwrap();
        let trial = Record::fresh(&schema, "a").unwrap();
        assert!(changed_fields(&target_fields, &reference, &trial).is_empty());
    }

    #[test]
    fn diff_flags_null_to_value_transitions() {
        let schema = schema();
        let target_fields = fields_of_type(&schema, "a").unwrap();
        let reference = Record::fresh(&schema, "a").unwrap();
        let mut trial = Record::fresh(&schema, "a").unwrap();
        trial.set("att2", json!("set"));
        let changed = changed_fields(&target_fields, &reference, &trial);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed.iter().next().unwrap().name, "att2");
    }
}
