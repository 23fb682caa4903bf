//! Relation inference by naming convention and explicit aliases
//!
//! Both directions run against a fully built [`Schema`]: the candidate index
//! needs every table's key field, so catalog fetches must be joined before a
//! pass starts. Every relation the engine attaches goes through
//! [`Schema::attach_outgoing`] or [`Schema::attach_incoming`], which keep the
//! forward and inverse lists mirrored and flag the referencing field.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::schema::types::{Alias, Relation, Schema};
use crate::utils::naming::{canonical_name, convention_names, singular_variant};

/// Knobs for a single inference pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Relations forced into the graph; applied even when conventions are off
    pub aliases: Vec<Alias>,
    pub ignore_conventions: bool,
    pub prefix: String,
    pub suffix: String,
    /// Register singular forms of table names as candidates too
    pub match_singular: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            aliases: Vec::new(),
            ignore_conventions: false,
            prefix: "id_".to_string(),
            suffix: "_id".to_string(),
            match_singular: true,
        }
    }
}

/// Something an alias expected in the schema that is not there.
///
/// Reported and skipped, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    #[error("alias {alias} references unknown table `{table}`")]
    UnknownTable { alias: String, table: String },

    #[error("alias {alias} references unknown field `{table}.{field}`")]
    UnknownField {
        alias: String,
        table: String,
        field: String,
    },

    #[error("table `{0}` is not part of the schema")]
    UnknownInferenceTarget(String),
}

/// Outcome of [`infer_by_naming`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceReport {
    pub outgoing_added: usize,
    pub incoming_added: usize,
    pub warnings: Vec<Inconsistency>,
}

impl InferenceReport {
    pub fn is_empty(&self) -> bool {
        self.outgoing_added == 0 && self.incoming_added == 0
    }
}

/// Apply both inference directions to every table, in catalog order.
///
/// Mutates `schema` in place. Running it twice with the same options adds
/// nothing the second time.
pub fn infer_by_naming(schema: &mut Schema, options: &InferenceOptions) -> InferenceReport {
    let mut engine = RelationInference::new(schema, options);
    let table_names: Vec<String> = schema.tables.keys().cloned().collect();

    for table_name in &table_names {
        engine.infer_outgoing(schema, table_name);
        engine.infer_incoming(schema, table_name);
    }

    let report = engine.into_report();
    for warning in &report.warnings {
        tracing::warn!(%warning, "Skipped inconsistent alias");
    }
    tracing::info!(
        outgoing = report.outgoing_added,
        incoming = report.incoming_added,
        "Relation inference finished"
    );

    report
}

/// A convention match: a referencing column name resolves to this table/key
#[derive(Debug, Clone)]
struct Candidate {
    table: String,
    key: String,
}

/// Convention names a table answers to, for the incoming direction
#[derive(Debug, Clone, Default)]
struct OwnNames {
    key: String,
    names: HashSet<String>,
}

/// Alias with names resolved to the exact spelling used in the schema
#[derive(Debug, Clone)]
struct ResolvedAlias {
    local_table: String,
    local_field: String,
    foreign_table: String,
    foreign_field: String,
}

/// Inference engine bound to one schema's table and field set.
///
/// Construction indexes convention candidates and resolves aliases; the
/// per-table operations then only touch relation lists and FK flags, which
/// the index does not depend on.
pub struct RelationInference {
    ignore_conventions: bool,
    candidates: HashMap<String, Candidate>,
    own_names: HashMap<String, OwnNames>,
    aliases: Vec<ResolvedAlias>,
    report: InferenceReport,
}

impl RelationInference {
    pub fn new(schema: &Schema, options: &InferenceOptions) -> Self {
        let (candidates, own_names) = if options.ignore_conventions {
            (HashMap::new(), HashMap::new())
        } else {
            build_candidates(schema, options)
        };

        let mut report = InferenceReport::default();
        let aliases = options
            .aliases
            .iter()
            .filter_map(|alias| match resolve_alias(schema, alias) {
                Ok(resolved) => Some(resolved),
                Err(inconsistency) => {
                    report.warnings.push(inconsistency);
                    None
                }
            })
            .collect();

        Self {
            ignore_conventions: options.ignore_conventions,
            candidates,
            own_names,
            aliases,
            report,
        }
    }

    /// Relations from `table_name` to other tables.
    ///
    /// Fields matching a convention candidate are attached first, then
    /// aliases whose local table is `table_name`. Returns the table's full
    /// outgoing list.
    pub fn infer_outgoing(&mut self, schema: &mut Schema, table_name: &str) -> Vec<Relation> {
        let Some(table_name) = self.resolve_target(schema, table_name) else {
            return Vec::new();
        };

        if !self.ignore_conventions {
            let matches: Vec<Relation> = schema.tables[&table_name]
                .fields
                .iter()
                .filter_map(|field| {
                    self.candidates
                        .get(&canonical_name(&field.name))
                        .map(|c| Relation::new(&field.name, &c.table, &c.key))
                })
                .collect();

            for relation in matches {
                tracing::debug!(table = %table_name, field = %relation.local_field, target = %relation.foreign_table, "Convention match");
                if schema.attach_outgoing(&table_name, relation) {
                    self.report.outgoing_added += 1;
                }
            }
        }

        let aliased: Vec<Relation> = self
            .aliases
            .iter()
            .filter(|alias| alias.local_table == table_name)
            .map(|alias| Relation::new(&alias.local_field, &alias.foreign_table, &alias.foreign_field))
            .collect();
        for relation in aliased {
            if schema.attach_outgoing(&table_name, relation) {
                self.report.outgoing_added += 1;
            }
        }

        schema.tables[&table_name]
            .relations_from_table
            .iter()
            .cloned()
            .collect()
    }

    /// Relations from other tables to `table_name`.
    ///
    /// Scans every other table for fields named after `table_name`'s own
    /// convention names, then applies aliases whose foreign table is
    /// `table_name`. Returns the table's full incoming list.
    pub fn infer_incoming(&mut self, schema: &mut Schema, table_name: &str) -> Vec<Relation> {
        let Some(table_name) = self.resolve_target(schema, table_name) else {
            return Vec::new();
        };

        if let Some(own) = self.own_names.get(&table_name) {
            let mut matches = Vec::new();
            for (other_name, other) in &schema.tables {
                if *other_name == table_name {
                    continue;
                }
                for field in &other.fields {
                    if own.names.contains(&canonical_name(&field.name)) {
                        matches.push(Relation::new(&own.key, other_name, &field.name));
                    }
                }
            }

            for relation in matches {
                if schema.attach_incoming(&table_name, relation) {
                    self.report.incoming_added += 1;
                }
            }
        }

        let aliased: Vec<Relation> = self
            .aliases
            .iter()
            .filter(|alias| alias.foreign_table == table_name)
            .map(|alias| Relation::new(&alias.foreign_field, &alias.local_table, &alias.local_field))
            .collect();
        for relation in aliased {
            if schema.attach_incoming(&table_name, relation) {
                self.report.incoming_added += 1;
            }
        }

        schema.tables[&table_name]
            .relations_to_table
            .iter()
            .cloned()
            .collect()
    }

    /// Warnings and counters collected so far
    pub fn report(&self) -> &InferenceReport {
        &self.report
    }

    pub fn into_report(self) -> InferenceReport {
        self.report
    }

    fn resolve_target(&mut self, schema: &Schema, table_name: &str) -> Option<String> {
        match schema.resolve_table(table_name) {
            Some(name) => Some(name.to_string()),
            None => {
                self.report
                    .warnings
                    .push(Inconsistency::UnknownInferenceTarget(table_name.to_string()));
                None
            }
        }
    }
}

/// Index every convention name to the table it references.
///
/// Exact table names are registered before singular forms, and the first
/// table claiming a name keeps it. Tables without an effective key field
/// contribute nothing.
///
/// Also returns each keyed table's own names: its exact names, plus its
/// singular names unless another table uses one as an exact name.
fn build_candidates(
    schema: &Schema,
    options: &InferenceOptions,
) -> (HashMap<String, Candidate>, HashMap<String, OwnNames>) {
    let mut candidates = HashMap::new();
    let mut own_names: HashMap<String, OwnNames> = HashMap::new();

    let keyed: Vec<(&String, &str)> = schema
        .tables
        .iter()
        .filter_map(|(name, table)| table.effective_key().map(|key| (name, key)))
        .collect();

    for &(name, key) in &keyed {
        let own = own_names.entry(name.clone()).or_insert_with(|| OwnNames {
            key: key.to_string(),
            names: HashSet::new(),
        });
        for candidate in convention_names(name, &options.prefix, &options.suffix) {
            own.names.insert(candidate.clone());
            candidates.entry(candidate).or_insert_with(|| Candidate {
                table: name.clone(),
                key: key.to_string(),
            });
        }
    }

    if options.match_singular {
        let exact: HashSet<String> = candidates.keys().cloned().collect();

        for &(name, key) in &keyed {
            let Some(singular) = singular_variant(name) else {
                continue;
            };
            for candidate in convention_names(&singular, &options.prefix, &options.suffix) {
                if exact.contains(&candidate) {
                    continue;
                }
                if let Some(own) = own_names.get_mut(name.as_str()) {
                    own.names.insert(candidate.clone());
                }
                candidates.entry(candidate).or_insert_with(|| Candidate {
                    table: name.clone(),
                    key: key.to_string(),
                });
            }
        }
    }

    (candidates, own_names)
}

fn resolve_alias(schema: &Schema, alias: &Alias) -> Result<ResolvedAlias, Inconsistency> {
    let label = format!(
        "{}.{} -> {}.{}",
        alias.local_table, alias.local_field, alias.foreign_table, alias.foreign_field
    );

    let (local_table, local_field) =
        resolve_column(schema, &label, &alias.local_table, &alias.local_field)?;
    let (foreign_table, foreign_field) =
        resolve_column(schema, &label, &alias.foreign_table, &alias.foreign_field)?;

    Ok(ResolvedAlias {
        local_table,
        local_field,
        foreign_table,
        foreign_field,
    })
}

fn resolve_column(
    schema: &Schema,
    label: &str,
    table: &str,
    field: &str,
) -> Result<(String, String), Inconsistency> {
    let table_name = schema
        .resolve_table(table)
        .ok_or_else(|| Inconsistency::UnknownTable {
            alias: label.to_string(),
            table: table.to_string(),
        })?;

    let field_name = schema.tables[table_name]
        .field(field)
        .map(|f| f.name.clone())
        .ok_or_else(|| Inconsistency::UnknownField {
            alias: label.to_string(),
            table: table_name.to_string(),
            field: field.to_string(),
        })?;

    Ok((table_name.to_string(), field_name))
}
