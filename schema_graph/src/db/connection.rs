//! Database connection handling
//!
//! This module provides functionality to establish and release the pool the
//! catalog readers query through.

use std::time::Duration;

use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, MySql, Pool,
    Postgres, Sqlite,
};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Enumeration of supported database types
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
    Sqlite(Pool<Sqlite>),
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(5);
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(30));

        tracing::debug!(driver = %config.driver, pool_size, "Connecting to database");

        match config.driver.as_str() {
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::Postgres(pool))
            }
            "mysql" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::MySql(pool))
            }
            "sqlite" => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(timeout)
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::Sqlite(pool))
            }
            _ => Err(Error::DatabaseError(format!(
                "Unsupported database driver: {}",
                config.driver
            ))),
        }
    }

    /// Backend tag, also used as the schema kind
    pub fn kind(&self) -> &'static str {
        match self {
            DatabaseConnection::Postgres(_) => "postgres",
            DatabaseConnection::MySql(_) => "mysql",
            DatabaseConnection::Sqlite(_) => "sqlite",
        }
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        match self {
            DatabaseConnection::Postgres(pool) => pool.close().await,
            DatabaseConnection::MySql(pool) => pool.close().await,
            DatabaseConnection::Sqlite(pool) => pool.close().await,
        }
        tracing::debug!(kind = self.kind(), "Closed database connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_memory_connection() {
        let config = DatabaseConfig {
            driver: "sqlite".to_string(),
            url: "sqlite::memory:".to_string(),
            schema: None,
            pool_size: Some(1),
            timeout_seconds: Some(5),
        };

        let connection = DatabaseConnection::connect(&config).await.unwrap();
        assert_eq!(connection.kind(), "sqlite");
        connection.close().await;
    }

    #[tokio::test]
    async fn test_unsupported_driver() {
        let config = DatabaseConfig {
            driver: "oracle".to_string(),
            url: "oracle://localhost".to_string(),
            schema: None,
            pool_size: None,
            timeout_seconds: None,
        };

        assert!(matches!(
            DatabaseConnection::connect(&config).await,
            Err(Error::DatabaseError(_))
        ));
    }
}
