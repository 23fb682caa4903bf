//! Schema assembly from catalog output
//!
//! Fields and declared relations are fetched concurrently per table and
//! joined before anything touches the [`Schema`].

use futures::future::try_join_all;
use std::collections::HashMap;

use crate::config::RelationsConfig;
use crate::error::{Error, Result};
use crate::schema::catalog::CatalogReader;
use crate::schema::inference::{infer_by_naming, InferenceReport};
use crate::schema::types::{Field, Relation, Schema, Table};

/// How declared relations combine with what a table already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Overwrite each table's lists (initial construction)
    Replace,
    /// Add to each table's lists (re-invocation)
    Append,
}

/// Assemble a schema from listed table names and their fields.
///
/// Tables keep the listing order; every table starts with empty relation
/// lists. A listed table without a field lookup is an error.
pub fn build_schema(
    kind: &str,
    table_names: &[String],
    mut fields_by_table: HashMap<String, Vec<Field>>,
) -> Result<Schema> {
    let mut schema = Schema::new(kind);

    for table_name in table_names {
        let fields = fields_by_table.remove(table_name).ok_or_else(|| {
            Error::CatalogUnavailable(format!("no field lookup for table `{}`", table_name))
        })?;
        schema.add_table(table_name, Table::new(fields));
    }

    Ok(schema)
}

/// Merge declared relations into each table's lists.
///
/// Relations are respelled with the schema's own table and field names, as
/// catalogs return identifiers the way they were written in the DDL. Every
/// outgoing relation flags its local field as foreign key. Relations listed
/// for tables outside the schema are dropped.
pub fn merge_declared_relations(
    schema: &mut Schema,
    mut relations_from_by_table: HashMap<String, Vec<Relation>>,
    mut relations_to_by_table: HashMap<String, Vec<Relation>>,
    mode: MergeMode,
) -> &mut Schema {
    let table_names: Vec<String> = schema.tables.keys().cloned().collect();

    for table_name in &table_names {
        let respell = |relations: Vec<Relation>| -> Vec<Relation> {
            relations
                .iter()
                .map(|relation| schema.canonical_relation(table_name, relation))
                .collect()
        };
        let relations_from = relations_from_by_table.remove(table_name).map(&respell);
        let relations_to = relations_to_by_table.remove(table_name).map(&respell);

        let Some(table) = schema.tables.get_mut(table_name) else {
            continue;
        };

        if let Some(relations) = relations_from {
            if mode == MergeMode::Replace {
                table.relations_from_table.clear();
            }
            for relation in relations {
                if !table.mark_foreign_key(&relation.local_field) {
                    tracing::debug!(table = %table_name, field = %relation.local_field, "Declared relation on unknown field");
                }
                table.relations_from_table.insert(relation);
            }
        }

        if let Some(relations) = relations_to {
            if mode == MergeMode::Replace {
                table.relations_to_table.clear();
            }
            table.relations_to_table.extend(relations);
        }
    }

    for table_name in relations_from_by_table.keys().chain(relations_to_by_table.keys()) {
        tracing::debug!(table = %table_name, "Ignoring declared relations of unknown table");
    }

    schema
}

/// Builds schemas through a catalog reader
pub struct SchemaBuilder<'a, C: CatalogReader + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: CatalogReader + ?Sized> SchemaBuilder<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// List tables and fetch every table's fields concurrently.
    ///
    /// The first failing fetch aborts the whole build.
    pub async fn build(&self) -> Result<Schema> {
        let table_names = self.catalog.list_tables().await?;
        tracing::debug!(tables = table_names.len(), "Listed catalog tables");

        let fetches = table_names.iter().map(|table_name| async move {
            let fields = self.catalog.list_fields(table_name).await?;
            Ok::<_, Error>((table_name.clone(), fields))
        });
        let fields_by_table: HashMap<String, Vec<Field>> =
            try_join_all(fetches).await?.into_iter().collect();

        build_schema(self.catalog.kind(), &table_names, fields_by_table)
    }

    /// Fetch declared relations of every table concurrently and merge them
    pub async fn merge_declared(&self, schema: &mut Schema, mode: MergeMode) -> Result<()> {
        let table_names: Vec<String> = schema.tables.keys().cloned().collect();

        let fetches = table_names.iter().map(|table_name| async move {
            let (from, to) = futures::try_join!(
                self.catalog.list_declared_relations_from(table_name),
                self.catalog.list_declared_relations_to(table_name),
            )?;
            Ok::<_, Error>((table_name.clone(), from, to))
        });
        let fetched = try_join_all(fetches).await?;

        let mut relations_from_by_table = HashMap::with_capacity(fetched.len());
        let mut relations_to_by_table = HashMap::with_capacity(fetched.len());
        for (table_name, from, to) in fetched {
            relations_from_by_table.insert(table_name.clone(), from);
            relations_to_by_table.insert(table_name, to);
        }

        merge_declared_relations(schema, relations_from_by_table, relations_to_by_table, mode);
        tracing::info!(relations = schema.relation_count(), "Merged declared relations");

        Ok(())
    }
}

/// Full introspection pipeline: build, merge declared relations, infer.
///
/// Which steps run after the build is decided by `relations`.
pub async fn introspect<C: CatalogReader + ?Sized>(
    catalog: &C,
    relations: &RelationsConfig,
) -> Result<(Schema, InferenceReport)> {
    let builder = SchemaBuilder::new(catalog);
    let mut schema = builder.build().await?;
    tracing::info!(kind = %schema.kind, tables = schema.tables.len(), "Built schema");

    if relations.extract_declared {
        builder.merge_declared(&mut schema, MergeMode::Replace).await?;
    }

    let report = if relations.discover_by_naming {
        infer_by_naming(&mut schema, &relations.inference_options())
    } else {
        InferenceReport::default()
    };

    Ok((schema, report))
}
