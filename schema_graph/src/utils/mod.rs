//! Utilities for schema_graph
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{canonical_name, convention_names, names_match, singularize};
