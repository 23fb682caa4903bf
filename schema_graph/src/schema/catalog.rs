//! Database catalog readers
//!
//! This module lists tables, fields and declared foreign keys for each
//! supported backend, plus an in-memory catalog for offline use.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::{FromRow, MySql, Pool, Postgres, Sqlite};
use std::collections::HashMap;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{Field, KeyKind, Relation};

/// Read access to a database catalog.
///
/// The schema (database, namespace) being read is fixed when the reader is
/// created. Every call fails with [`Error::CatalogUnavailable`].
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Tag recorded as the schema kind (`mysql`, `postgres`, ...)
    fn kind(&self) -> &str;

    /// Table names in listing order
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Fields of `table` in column order
    async fn list_fields(&self, table: &str) -> Result<Vec<Field>>;

    /// Declared foreign keys held by `table`
    async fn list_declared_relations_from(&self, table: &str) -> Result<Vec<Relation>>;

    /// Declared foreign keys of other tables pointing at `table`
    async fn list_declared_relations_to(&self, table: &str) -> Result<Vec<Relation>>;
}

/// Open the catalog reader matching the connection's backend
pub fn open_catalog<'a>(
    connection: &'a DatabaseConnection,
    schema: Option<&'a str>,
) -> Box<dyn CatalogReader + 'a> {
    match connection {
        DatabaseConnection::MySql(pool) => Box::new(MySqlCatalog { pool, schema }),
        DatabaseConnection::Postgres(pool) => Box::new(PostgresCatalog { pool, schema }),
        DatabaseConnection::Sqlite(pool) => Box::new(SqliteCatalog { pool }),
    }
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
}

#[derive(FromRow)]
struct RelationRow {
    local_field: String,
    foreign_table: String,
    foreign_field: String,
}

impl From<RelationRow> for Relation {
    fn from(row: RelationRow) -> Self {
        Relation {
            local_field: row.local_field,
            foreign_table: row.foreign_table,
            foreign_field: row.foreign_field,
        }
    }
}

#[derive(FromRow)]
struct MySqlColumnRow {
    column_name: String,
    column_type: String,
    is_nullable: String,
    column_key: String,
    column_default: Option<String>,
    extra: String,
}

/// MySQL / MariaDB catalog via `information_schema`
struct MySqlCatalog<'a> {
    pool: &'a Pool<MySql>,
    schema: Option<&'a str>,
}

#[async_trait]
impl<'a> CatalogReader for MySqlCatalog<'a> {
    fn kind(&self) -> &str {
        "mysql"
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT CAST(table_name AS CHAR) AS table_name
            FROM information_schema.tables
            WHERE table_schema = COALESCE(?, DATABASE())
            ORDER BY table_name
        "#;

        let rows = sqlx::query_as::<_, TableRow>(sql)
            .bind(self.schema)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog("listing tables", e))?;

        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Field>> {
        let sql = r#"
            SELECT
                CAST(column_name AS CHAR) AS column_name,
                CAST(column_type AS CHAR) AS column_type,
                CAST(is_nullable AS CHAR) AS is_nullable,
                CAST(column_key AS CHAR) AS column_key,
                CAST(column_default AS CHAR) AS column_default,
                CAST(extra AS CHAR) AS extra
            FROM information_schema.columns
            WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query_as::<_, MySqlColumnRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing fields of `{}`", table), e))?;

        Ok(rows
            .into_iter()
            .map(|col| Field {
                name: col.column_name,
                data_type: col.column_type,
                nullable: col.is_nullable == "YES",
                key_kind: KeyKind::from_mysql(&col.column_key),
                default_value: col.column_default,
                extra: col.extra,
                is_foreign_key: false,
            })
            .collect())
    }

    async fn list_declared_relations_from(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT
                CAST(column_name AS CHAR) AS local_field,
                CAST(referenced_table_name AS CHAR) AS foreign_table,
                CAST(referenced_column_name AS CHAR) AS foreign_field
            FROM information_schema.key_column_usage
            WHERE table_schema = COALESCE(?, DATABASE())
              AND referenced_table_name IS NOT NULL
              AND table_name = ?
            ORDER BY constraint_name, ordinal_position
        "#;

        let rows = sqlx::query_as::<_, RelationRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations from `{}`", table), e))?;

        Ok(rows.into_iter().map(Relation::from).collect())
    }

    async fn list_declared_relations_to(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT
                CAST(referenced_column_name AS CHAR) AS local_field,
                CAST(table_name AS CHAR) AS foreign_table,
                CAST(column_name AS CHAR) AS foreign_field
            FROM information_schema.key_column_usage
            WHERE table_schema = COALESCE(?, DATABASE())
              AND referenced_table_name = ?
            ORDER BY table_name, constraint_name, ordinal_position
        "#;

        let rows = sqlx::query_as::<_, RelationRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations to `{}`", table), e))?;

        Ok(rows.into_iter().map(Relation::from).collect())
    }
}

#[derive(FromRow)]
struct PgColumnRow {
    column_name: String,
    data_type: String,
    character_maximum_length: Option<i32>,
    is_nullable: String,
    column_default: Option<String>,
    is_identity: String,
}

#[derive(FromRow)]
struct PgKeyRow {
    column_name: String,
    key_type: String,
}

/// PostgreSQL catalog via `information_schema` and `pg_index`
struct PostgresCatalog<'a> {
    pool: &'a Pool<Postgres>,
    schema: Option<&'a str>,
}

impl<'a> PostgresCatalog<'a> {
    /// Strongest key participation per column
    async fn key_kinds(&self, table: &str) -> Result<HashMap<String, KeyKind>> {
        let sql = r#"
            SELECT kcu.column_name::text AS column_name, tc.constraint_type::text AS key_type
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.table_schema = COALESCE($1::text, current_schema())
              AND tc.table_name = $2
              AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
            UNION ALL
            SELECT a.attname::text AS column_name, 'INDEX' AS key_type
            FROM pg_index ix
            JOIN pg_class t ON t.oid = ix.indrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = COALESCE($1::text, current_schema())
              AND t.relname = $2
              AND NOT ix.indisprimary
              AND NOT ix.indisunique
        "#;

        let rows = sqlx::query_as::<_, PgKeyRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing keys of `{}`", table), e))?;

        let mut kinds = HashMap::new();
        for row in rows {
            let kind = match row.key_type.as_str() {
                "PRIMARY KEY" => KeyKind::Primary,
                "UNIQUE" => KeyKind::Unique,
                _ => KeyKind::Index,
            };
            let entry = kinds.entry(row.column_name).or_insert(kind);
            if key_rank(kind) > key_rank(*entry) {
                *entry = kind;
            }
        }

        Ok(kinds)
    }
}

fn key_rank(kind: KeyKind) -> u8 {
    match kind {
        KeyKind::Primary => 3,
        KeyKind::Unique => 2,
        KeyKind::Index => 1,
        KeyKind::None => 0,
    }
}

#[async_trait]
impl<'a> CatalogReader for PostgresCatalog<'a> {
    fn kind(&self) -> &str {
        "postgres"
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = COALESCE($1::text, current_schema())
              AND table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY table_name
        "#;

        let rows = sqlx::query_as::<_, TableRow>(sql)
            .bind(self.schema)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog("listing tables", e))?;

        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Field>> {
        let sql = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                character_maximum_length::int4 AS character_maximum_length,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default,
                is_identity::text AS is_identity
            FROM information_schema.columns
            WHERE table_schema = COALESCE($1::text, current_schema()) AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query_as::<_, PgColumnRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing fields of `{}`", table), e))?;

        let kinds = self.key_kinds(table).await?;

        Ok(rows
            .into_iter()
            .map(|col| {
                let data_type = match col.character_maximum_length {
                    Some(max_length) if col.data_type == "character varying" => {
                        format!("varchar({})", max_length)
                    }
                    _ => col.data_type,
                };

                let extra = if col.is_identity == "YES" {
                    "identity"
                } else if col
                    .column_default
                    .as_deref()
                    .is_some_and(|default| default.starts_with("nextval("))
                {
                    "auto_increment"
                } else {
                    ""
                };

                Field {
                    key_kind: kinds.get(&col.column_name).copied().unwrap_or_default(),
                    name: col.column_name,
                    data_type,
                    nullable: col.is_nullable == "YES",
                    default_value: col.column_default,
                    extra: extra.to_string(),
                    is_foreign_key: false,
                }
            })
            .collect())
    }

    async fn list_declared_relations_from(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT
                kcu.column_name::text AS local_field,
                ccu.table_name::text AS foreign_table,
                ccu.column_name::text AS foreign_field
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = COALESCE($1::text, current_schema())
              AND tc.table_name = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query_as::<_, RelationRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations from `{}`", table), e))?;

        Ok(rows.into_iter().map(Relation::from).collect())
    }

    async fn list_declared_relations_to(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT
                ccu.column_name::text AS local_field,
                tc.table_name::text AS foreign_table,
                kcu.column_name::text AS foreign_field
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = COALESCE($1::text, current_schema())
              AND ccu.table_name = $2
            ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position
        "#;

        let rows = sqlx::query_as::<_, RelationRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations to `{}`", table), e))?;

        Ok(rows.into_iter().map(Relation::from).collect())
    }
}

#[derive(FromRow)]
struct SqliteColumnRow {
    name: String,
    data_type: String,
    not_null: i64,
    dflt_value: Option<String>,
    pk: i64,
}

#[derive(FromRow)]
struct SqliteIndexRow {
    column_name: Option<String>,
    is_unique: i64,
}

#[derive(FromRow)]
struct SqliteForeignKeyRow {
    local_field: Option<String>,
    foreign_table: String,
    foreign_field: Option<String>,
}

/// SQLite catalog via `sqlite_master` and table-valued pragmas
struct SqliteCatalog<'a> {
    pool: &'a Pool<Sqlite>,
}

impl<'a> SqliteCatalog<'a> {
    /// Column a foreign key targets when the constraint names none
    async fn primary_key(&self, table: &str) -> Result<String> {
        let sql = r#"SELECT name FROM pragma_table_info(?1) WHERE pk = 1"#;

        let name: Option<String> = sqlx::query_scalar(sql)
            .bind(table)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("reading primary key of `{}`", table), e))?;

        Ok(name.unwrap_or_else(|| "id".to_string()))
    }
}

#[async_trait]
impl<'a> CatalogReader for SqliteCatalog<'a> {
    fn kind(&self) -> &str {
        "sqlite"
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT name AS table_name
            FROM sqlite_master
            WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows = sqlx::query_as::<_, TableRow>(sql)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog("listing tables", e))?;

        Ok(rows.into_iter().map(|row| row.table_name).collect())
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Field>> {
        let sql = r#"
            SELECT name, type AS data_type, "notnull" AS not_null, dflt_value, pk
            FROM pragma_table_info(?1)
            ORDER BY cid
        "#;

        let columns = sqlx::query_as::<_, SqliteColumnRow>(sql)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing fields of `{}`", table), e))?;

        let sql = r#"
            SELECT ii.name AS column_name, il."unique" AS is_unique
            FROM pragma_index_list(?1) AS il
            JOIN pragma_index_info(il.name) AS ii
        "#;

        let indexes = sqlx::query_as::<_, SqliteIndexRow>(sql)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing indexes of `{}`", table), e))?;

        let mut kinds: HashMap<String, KeyKind> = HashMap::new();
        for index in indexes {
            let Some(column) = index.column_name else {
                continue;
            };
            let kind = if index.is_unique != 0 {
                KeyKind::Unique
            } else {
                KeyKind::Index
            };
            let entry = kinds.entry(column).or_insert(kind);
            if key_rank(kind) > key_rank(*entry) {
                *entry = kind;
            }
        }

        Ok(columns
            .into_iter()
            .map(|col| Field {
                key_kind: if col.pk > 0 {
                    KeyKind::Primary
                } else {
                    kinds.get(&col.name).copied().unwrap_or_default()
                },
                name: col.name,
                data_type: col.data_type,
                nullable: col.not_null == 0 && col.pk == 0,
                default_value: col.dflt_value,
                extra: String::new(),
                is_foreign_key: false,
            })
            .collect())
    }

    async fn list_declared_relations_from(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT "from" AS local_field, "table" AS foreign_table, "to" AS foreign_field
            FROM pragma_foreign_key_list(?1)
            ORDER BY id, seq
        "#;

        let rows = sqlx::query_as::<_, SqliteForeignKeyRow>(sql)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations from `{}`", table), e))?;

        let mut relations = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(local_field) = row.local_field else {
                continue;
            };
            let foreign_field = match row.foreign_field {
                Some(field) => field,
                None => self.primary_key(&row.foreign_table).await?,
            };
            relations.push(Relation {
                local_field,
                foreign_table: row.foreign_table,
                foreign_field,
            });
        }

        Ok(relations)
    }

    async fn list_declared_relations_to(&self, table: &str) -> Result<Vec<Relation>> {
        let sql = r#"
            SELECT fk."to" AS local_field, m.name AS foreign_table, fk."from" AS foreign_field
            FROM sqlite_master AS m
            JOIN pragma_foreign_key_list(m.name) AS fk
            WHERE m.type = 'table' AND fk."table" = ?1 COLLATE NOCASE
            ORDER BY m.name, fk.id, fk.seq
        "#;

        let rows = sqlx::query_as::<_, SqliteForeignKeyRow>(sql)
            .bind(table)
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::catalog(format!("listing relations to `{}`", table), e))?;

        let mut relations = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(foreign_field) = row.foreign_field else {
                continue;
            };
            let local_field = match row.local_field {
                Some(field) => field,
                None => self.primary_key(table).await?,
            };
            relations.push(Relation {
                local_field,
                foreign_table: row.foreign_table,
                foreign_field,
            });
        }

        Ok(relations)
    }
}

/// Catalog held in memory, listing tables in insertion order.
///
/// Declared relations are stored once on the referencing table and served in
/// both directions, as a live catalog would.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    kind: String,
    tables: IndexMap<String, Option<Vec<Field>>>,
    relations: Vec<(String, Relation)>,
}

impl InMemoryCatalog {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// Add a table with its fields in column order
    pub fn with_table(mut self, name: &str, fields: Vec<Field>) -> Self {
        self.tables.insert(name.to_string(), Some(fields));
        self
    }

    /// List a table whose field lookup fails
    pub fn with_unavailable_table(mut self, name: &str) -> Self {
        self.tables.insert(name.to_string(), None);
        self
    }

    /// Declare a foreign key held by `table`
    pub fn with_relation(mut self, table: &str, relation: Relation) -> Self {
        self.relations.push((table.to_string(), relation));
        self
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Field>> {
        match self.tables.get(table) {
            Some(Some(fields)) => Ok(fields.clone()),
            _ => Err(Error::CatalogUnavailable(format!(
                "no field lookup for table `{}`",
                table
            ))),
        }
    }

    async fn list_declared_relations_from(&self, table: &str) -> Result<Vec<Relation>> {
        Ok(self
            .relations
            .iter()
            .filter(|(owner, _)| owner == table)
            .map(|(_, relation)| relation.clone())
            .collect())
    }

    async fn list_declared_relations_to(&self, table: &str) -> Result<Vec<Relation>> {
        Ok(self
            .relations
            .iter()
            .filter(|(_, relation)| relation.foreign_table == table)
            .map(|(owner, relation)| relation.mirrored(owner))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new("mysql")
            .with_table("contacts", vec![Field::new("id", "int").key(KeyKind::Primary)])
            .with_table(
                "phones",
                vec![
                    Field::new("id", "int").key(KeyKind::Primary),
                    Field::new("contact_id", "int"),
                ],
            )
            .with_relation("phones", Relation::new("contact_id", "contacts", "id"))
    }

    #[tokio::test]
    async fn test_in_memory_catalog_serves_both_directions() {
        let catalog = catalog();

        assert_eq!(catalog.list_tables().await.unwrap(), vec!["contacts", "phones"]);
        assert_eq!(
            catalog.list_declared_relations_from("phones").await.unwrap(),
            vec![Relation::new("contact_id", "contacts", "id")]
        );
        assert_eq!(
            catalog.list_declared_relations_to("contacts").await.unwrap(),
            vec![Relation::new("id", "phones", "contact_id")]
        );
        assert!(catalog.list_declared_relations_to("phones").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_catalog_unavailable_table() {
        let catalog = catalog().with_unavailable_table("faxes");

        assert_eq!(catalog.list_tables().await.unwrap().len(), 3);
        assert!(matches!(
            catalog.list_fields("faxes").await,
            Err(Error::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn test_key_rank_orders_primary_first() {
        assert!(key_rank(KeyKind::Primary) > key_rank(KeyKind::Unique));
        assert!(key_rank(KeyKind::Unique) > key_rank(KeyKind::Index));
        assert!(key_rank(KeyKind::Index) > key_rank(KeyKind::None));
    }
}
