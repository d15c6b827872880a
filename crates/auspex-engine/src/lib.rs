//! mapping-plausibility verification engine.
//!
//! Given a black-box mapper function from one record type to another,
//! the engine learns which source field maps to which target field by
//! perturbing one source field at a time, checks that every target
//! field is covered, and then replays a catalog of test values through
//! a type-directed value oracle to verify that the mapping is
//! value-correct, without the caller ever declaring the mapping by
//! hand.

mod catalog;
mod converters;
mod learner;
mod loader;
mod oracle;
mod overrides;
mod verifier;

pub use catalog::{CatalogError, TestValueCatalog};
pub use converters::{int_to_long, Converter, ConverterRegistry, TypePair};
pub use learner::{learn_mapping, LearnedMapping};
pub use loader::{load_catalog, CatalogDocument};
pub use oracle::{Oracle, OracleError};
pub use overrides::{OverrideMapping, OverrideRegistry};
pub use verifier::{MapperCheck, MapperFn, SourceFactory, VerifyError};
