//! Error types for schema_graph

use thiserror::Error;

/// Result type for schema_graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_graph
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A catalog query failed or a listed table has no field lookup
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The export sink rejected a document
    #[error("Sink error: {0}")]
    SinkError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Wrap a failed catalog query with what was being read
    pub(crate) fn catalog(context: impl std::fmt::Display, error: sqlx::Error) -> Self {
        Error::CatalogUnavailable(format!("{}: {}", context, error))
    }
}

/// Convert Serde JSON errors to schema_graph errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_graph errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

/// Convert YAML deserialization errors to schema_graph errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
