//! Schema module for schema_graph
//!
//! This module handles catalog reading, schema assembly and relation
//! inference.

pub mod builder;
pub mod catalog;
pub mod inference;
pub mod types;

// Re-export key types
pub use builder::{build_schema, introspect, merge_declared_relations, MergeMode, SchemaBuilder};
pub use catalog::{open_catalog, CatalogReader, InMemoryCatalog};
pub use inference::{infer_by_naming, Inconsistency, InferenceOptions, InferenceReport, RelationInference};
pub use types::{Alias, Field, KeyKind, Relation, Schema, Table};
