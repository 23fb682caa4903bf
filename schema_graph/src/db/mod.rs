//! Database module for schema_graph
//!
//! This module handles database connections.

pub mod connection;

// Re-export key types
pub use connection::DatabaseConnection;
