//! Type definitions for the schema graph
//!
//! The serialized shape of these types is the exported artifact, so field
//! names are fixed with serde renames.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::utils::naming::names_match;

/// Represents a complete database schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Source system tag (`mysql`, `postgres`, `sqlite`, `snapshot`)
    pub kind: String,
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            tables: IndexMap::new(),
        }
    }

    /// Add a table to the schema, replacing any table with the same name
    pub fn add_table(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_string(), table);
    }

    /// Resolve a table name case-insensitively, preferring an exact match
    pub fn resolve_table(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.tables.get_key_value(name) {
            return Some(key.as_str());
        }
        self.tables
            .keys()
            .find(|key| names_match(key, name))
            .map(|key| key.as_str())
    }

    /// `relation`, held by `owner`, spelled with the schema's own table and
    /// field names. Names the schema does not know are kept as given.
    pub fn canonical_relation(&self, owner: &str, relation: &Relation) -> Relation {
        let local_field = self
            .tables
            .get(owner)
            .and_then(|table| table.field(&relation.local_field))
            .map_or(relation.local_field.as_str(), |field| field.name.as_str());
        let foreign_table = self
            .resolve_table(&relation.foreign_table)
            .unwrap_or(relation.foreign_table.as_str());
        let foreign_field = self
            .tables
            .get(foreign_table)
            .and_then(|table| table.field(&relation.foreign_field))
            .map_or(relation.foreign_field.as_str(), |field| field.name.as_str());

        Relation::new(local_field, foreign_table, foreign_field)
    }

    /// Attach an outgoing relation to `table` and repair its mirror.
    ///
    /// Marks the local field as foreign key. Returns `true` when the forward
    /// relation was not present before.
    pub fn attach_outgoing(&mut self, table: &str, relation: Relation) -> bool {
        let relation = self.canonical_relation(table, &relation);
        let mirror = relation.mirrored(table);
        let target = relation.foreign_table.clone();

        let Some(local) = self.tables.get_mut(table) else {
            return false;
        };
        local.mark_foreign_key(&relation.local_field);
        let added = local.relations_from_table.insert(relation);

        if let Some(foreign) = self.tables.get_mut(&target) {
            foreign.relations_to_table.insert(mirror);
        }

        added
    }

    /// Attach an incoming relation to `table` and repair its mirror.
    ///
    /// The mirror lands in the referencing table's outgoing list and flags
    /// the referencing field as foreign key. Returns `true` when the incoming
    /// relation was not present before.
    pub fn attach_incoming(&mut self, table: &str, relation: Relation) -> bool {
        let relation = self.canonical_relation(table, &relation);
        let mirror = relation.mirrored(table);
        let source = relation.foreign_table.clone();

        let Some(local) = self.tables.get_mut(table) else {
            return false;
        };
        let added = local.relations_to_table.insert(relation);

        if let Some(referencing) = self.tables.get_mut(&source) {
            referencing.mark_foreign_key(&mirror.local_field);
            referencing.relations_from_table.insert(mirror);
        }

        added
    }

    /// Relations whose mirror is missing, as `(owning table, relation)`.
    ///
    /// Covers both directions; relations pointing at tables outside the
    /// schema are ignored.
    pub fn missing_mirrors(&self) -> Vec<(String, Relation)> {
        let mut missing = Vec::new();

        for (name, table) in &self.tables {
            for relation in &table.relations_from_table {
                if let Some(target) = self.tables.get(&relation.foreign_table) {
                    if !target.relations_to_table.contains(&relation.mirrored(name)) {
                        missing.push((name.clone(), relation.clone()));
                    }
                }
            }
            for relation in &table.relations_to_table {
                if let Some(source) = self.tables.get(&relation.foreign_table) {
                    if !source.relations_from_table.contains(&relation.mirrored(name)) {
                        missing.push((name.clone(), relation.clone()));
                    }
                }
            }
        }

        missing
    }

    /// Total number of outgoing relations across all tables
    pub fn relation_count(&self) -> usize {
        self.tables
            .values()
            .map(|table| table.relations_from_table.len())
            .sum()
    }
}

/// Represents a database table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relations_from_table: IndexSet<Relation>,
    #[serde(default)]
    pub relations_to_table: IndexSet<Relation>,
}

impl Table {
    /// Create a table from its fields in catalog order
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            relations_from_table: IndexSet::new(),
            relations_to_table: IndexSet::new(),
        }
    }

    /// Find a field by name, case-insensitively
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| names_match(&field.name, name))
    }

    /// The field identifying a row for relation purposes.
    ///
    /// The first primary field, else a field literally named `id`.
    /// `None` when neither exists.
    pub fn effective_key(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key_kind == KeyKind::Primary)
            .or_else(|| self.field("id"))
            .map(|field| field.name.as_str())
    }

    /// Flag the field called `name` as foreign key. Returns whether it exists.
    pub fn mark_foreign_key(&mut self, name: &str) -> bool {
        match self.fields.iter_mut().find(|field| names_match(&field.name, name)) {
            Some(field) => {
                field.is_foreign_key = true;
                true
            }
            None => false,
        }
    }
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub key_kind: KeyKind,
    pub default_value: Option<String>,
    pub extra: String,
    #[serde(default)]
    pub is_foreign_key: bool,
}

impl Field {
    /// Create a new non-nullable field with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            key_kind: KeyKind::None,
            default_value: None,
            extra: String::new(),
            is_foreign_key: false,
        }
    }

    /// Set whether the field is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the key kind of the field
    pub fn key(mut self, key_kind: KeyKind) -> Self {
        self.key_kind = key_kind;
        self
    }

    /// Set a default value for the field
    pub fn default_value(mut self, default: &str) -> Self {
        self.default_value = Some(default.to_string());
        self
    }

    /// Set the extra attributes (e.g. `auto_increment`)
    pub fn extra(mut self, extra: &str) -> Self {
        self.extra = extra.to_string();
        self
    }
}

/// Index participation of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyKind {
    Primary,
    Unique,
    Index,
    #[default]
    None,
}

impl KeyKind {
    /// Map MySQL's `COLUMN_KEY` codes
    pub fn from_mysql(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "PRI" => KeyKind::Primary,
            "UNI" => KeyKind::Unique,
            "MUL" => KeyKind::Index,
            _ => KeyKind::None,
        }
    }
}

/// Directional edge: this table's `local_field` references
/// `foreign_table.foreign_field`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub local_field: String,
    pub foreign_table: String,
    pub foreign_field: String,
}

impl Relation {
    pub fn new(local_field: &str, foreign_table: &str, foreign_field: &str) -> Self {
        Self {
            local_field: local_field.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_field: foreign_field.to_string(),
        }
    }

    /// The same edge seen from the other end, given the table owning `self`
    pub fn mirrored(&self, owner: &str) -> Relation {
        Relation {
            local_field: self.foreign_field.clone(),
            foreign_table: owner.to_string(),
            foreign_field: self.local_field.clone(),
        }
    }
}

/// A relation forced into the graph regardless of naming convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub local_table: String,
    pub local_field: String,
    pub foreign_table: String,
    pub foreign_field: String,
}

impl Alias {
    pub fn new(local_table: &str, local_field: &str, foreign_table: &str, foreign_field: &str) -> Self {
        Self {
            local_table: local_table.to_string(),
            local_field: local_field.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_field: foreign_field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn phones() -> Table {
        Table::new(vec![
            Field::new("id", "int(11)").key(KeyKind::Primary).extra("auto_increment"),
            Field::new("contact_id", "int(11)").key(KeyKind::Index),
            Field::new("phone_number", "varchar(32)").nullable(true),
        ])
    }

    #[test]
    fn test_effective_key_prefers_primary() {
        let table = Table::new(vec![
            Field::new("id", "int"),
            Field::new("code", "char(3)").key(KeyKind::Primary),
        ]);
        assert_eq!(table.effective_key(), Some("code"));
    }

    #[test]
    fn test_effective_key_falls_back_to_id() {
        let table = Table::new(vec![Field::new("name", "text"), Field::new("ID", "int")]);
        assert_eq!(table.effective_key(), Some("ID"));

        let keyless = Table::new(vec![Field::new("name", "text")]);
        assert_eq!(keyless.effective_key(), None);
    }

    #[test]
    fn test_mark_foreign_key_by_name() {
        let mut table = phones();
        assert!(table.mark_foreign_key("CONTACT_ID"));
        assert!(!table.mark_foreign_key("missing"));

        let flagged: Vec<&str> = table
            .fields
            .iter()
            .filter(|f| f.is_foreign_key)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["contact_id"]);
    }

    #[test]
    fn test_attach_outgoing_keeps_mirror() {
        let mut schema = Schema::new("mysql");
        schema.add_table("contacts", Table::new(vec![Field::new("id", "int").key(KeyKind::Primary)]));
        schema.add_table("phones", phones());

        let relation = Relation::new("contact_id", "contacts", "id");
        assert!(schema.attach_outgoing("phones", relation.clone()));
        assert!(!schema.attach_outgoing("phones", relation));

        assert_eq!(schema.tables["phones"].relations_from_table.len(), 1);
        assert!(schema.tables["contacts"]
            .relations_to_table
            .contains(&Relation::new("id", "phones", "contact_id")));
        assert!(schema.missing_mirrors().is_empty());
    }

    #[test]
    fn test_attach_uses_schema_spelling() {
        let mut schema = Schema::new("sqlite");
        schema.add_table("contacts", Table::new(vec![Field::new("id", "int").key(KeyKind::Primary)]));
        schema.add_table("phones", phones());

        assert!(schema.attach_outgoing("phones", Relation::new("contact_id", "contacts", "id")));
        assert!(!schema.attach_outgoing("phones", Relation::new("CONTACT_ID", "Contacts", "ID")));
        assert!(!schema.attach_incoming("contacts", Relation::new("Id", "PHONES", "Contact_Id")));

        assert_eq!(schema.relation_count(), 1);
        assert_eq!(schema.tables["contacts"].relations_to_table.len(), 1);
        assert!(schema.missing_mirrors().is_empty());
    }

    #[test]
    fn test_canonical_relation_keeps_unknown_names() {
        let mut schema = Schema::new("sqlite");
        schema.add_table("phones", phones());

        assert_eq!(
            schema.canonical_relation("phones", &Relation::new("Contact_ID", "Archive", "Key")),
            Relation::new("contact_id", "Archive", "Key")
        );
    }

    #[test]
    fn test_missing_mirrors_detects_one_sided_relation() {
        let mut schema = Schema::new("mysql");
        schema.add_table("contacts", Table::new(vec![Field::new("id", "int")]));
        let mut table = phones();
        table
            .relations_from_table
            .insert(Relation::new("contact_id", "contacts", "id"));
        schema.add_table("phones", table);

        assert_eq!(
            schema.missing_mirrors(),
            vec![("phones".to_string(), Relation::new("contact_id", "contacts", "id"))]
        );
    }

    #[test]
    fn test_json_shape() {
        let field = Field::new("id", "int(11)").key(KeyKind::Primary);
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "id",
                "type": "int(11)",
                "nullable": false,
                "keyKind": "PRIMARY",
                "defaultValue": null,
                "extra": "",
                "isForeignKey": false
            })
        );

        let relation = serde_json::to_value(Relation::new("contact_id", "contacts", "id")).unwrap();
        assert_eq!(
            relation,
            serde_json::json!({"localField": "contact_id", "foreignTable": "contacts", "foreignField": "id"})
        );
    }

    #[test]
    fn test_key_kind_from_mysql() {
        assert_eq!(KeyKind::from_mysql("PRI"), KeyKind::Primary);
        assert_eq!(KeyKind::from_mysql("uni"), KeyKind::Unique);
        assert_eq!(KeyKind::from_mysql("MUL"), KeyKind::Index);
        assert_eq!(KeyKind::from_mysql(""), KeyKind::None);
    }
}
