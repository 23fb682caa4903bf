//! schema_graph: exports a database catalog as a JSON relation graph
//!
//! Tables, columns and declared foreign keys are read from the catalog, and
//! relations can additionally be inferred from column naming conventions
//! (`contact_id`, `id_contact`) or forced through aliases. The resulting graph
//! is written as one JSON document per table or as a single combined file.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod schema;
pub mod utils;

use std::path::Path;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use error::{Error, Result};
pub use export::{FileSink, Sink};
pub use schema::inference::{infer_by_naming, InferenceOptions, InferenceReport};
pub use schema::types::{Alias, Field, KeyKind, Relation, Schema, Table};

/// Initialize a client with the specified configuration file
pub async fn init(config_path: impl AsRef<Path>) -> Result<SchemaGraphClient> {
    let config = config::load_from_file(config_path)?;
    SchemaGraphClient::new(config).await
}

/// Connect, export as configured, and close the connection.
///
/// The connection is released even when the export fails. Returns the number
/// of documents written.
pub async fn export_database<S: Sink>(config: Config, sink: &S) -> Result<usize> {
    let client = SchemaGraphClient::new(config).await?;
    let result = client.export(sink).await;
    client.close().await;
    result
}

/// The main client for reading and exporting a database's schema graph
pub struct SchemaGraphClient {
    config: Config,
    db_connection: DatabaseConnection,
}

impl SchemaGraphClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db_connection = DatabaseConnection::connect(&config.database).await?;

        Ok(Self {
            config,
            db_connection,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the schema graph with the configured relation steps
    pub async fn introspect(&self) -> Result<(Schema, InferenceReport)> {
        let catalog =
            schema::catalog::open_catalog(&self.db_connection, self.config.database.schema.as_deref());
        schema::builder::introspect(catalog.as_ref(), &self.config.relations).await
    }

    /// Introspect and write the graph to `sink` in the configured layout
    pub async fn export<S: Sink>(&self, sink: &S) -> Result<usize> {
        let (schema, _) = self.introspect().await?;
        let output = &self.config.output;

        export::export_schema(
            &schema,
            sink,
            &output.folder,
            output.mode,
            &self.config.export_name(),
        )
    }

    /// Release the database connection
    pub async fn close(self) {
        self.db_connection.close().await;
    }
}
