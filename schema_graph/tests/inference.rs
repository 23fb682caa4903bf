//! Relation inference properties over whole schemas

use pretty_assertions::assert_eq;
use rstest::*;

use schema_graph::schema::RelationInference;
use schema_graph::{infer_by_naming, Alias, Field, InferenceOptions, KeyKind, Relation, Schema, Table};

#[fixture]
fn contacts() -> Schema {
    let mut schema = Schema::new("mysql");
    schema.add_table(
        "contacts",
        Table::new(vec![
            Field::new("id", "int(11)").key(KeyKind::Primary).extra("auto_increment"),
            Field::new("name", "varchar(255)"),
        ]),
    );
    schema.add_table(
        "phones",
        Table::new(vec![
            Field::new("id", "int(11)").key(KeyKind::Primary).extra("auto_increment"),
            Field::new("contact_id", "int(11)"),
            Field::new("phone_type", "int(11)").nullable(true),
            Field::new("phone_number", "varchar(32)"),
        ]),
    );
    schema.add_table(
        "phone_types",
        Table::new(vec![
            Field::new("id", "int(11)").key(KeyKind::Primary),
            Field::new("label", "varchar(64)"),
        ]),
    );
    schema
}

fn phone_type_alias() -> Alias {
    Alias::new("phones", "phone_type", "phone_types", "id")
}

fn outgoing(schema: &Schema, table: &str) -> Vec<Relation> {
    schema.tables[table].relations_from_table.iter().cloned().collect()
}

fn incoming(schema: &Schema, table: &str) -> Vec<Relation> {
    schema.tables[table].relations_to_table.iter().cloned().collect()
}

#[rstest]
fn phones_point_to_contacts(mut contacts: Schema) {
    let options = InferenceOptions::default();
    let mut engine = RelationInference::new(&contacts, &options);

    let relations = engine.infer_outgoing(&mut contacts, "phones");

    assert_eq!(relations, vec![Relation::new("contact_id", "contacts", "id")]);
    assert_eq!(
        incoming(&contacts, "contacts"),
        vec![Relation::new("id", "phones", "contact_id")]
    );
}

#[rstest]
fn whole_schema_pass(mut contacts: Schema) {
    let options = InferenceOptions {
        aliases: vec![phone_type_alias()],
        ..InferenceOptions::default()
    };

    let report = infer_by_naming(&mut contacts, &options);

    assert!(report.warnings.is_empty());
    assert_eq!(
        outgoing(&contacts, "phones"),
        vec![
            Relation::new("contact_id", "contacts", "id"),
            Relation::new("phone_type", "phone_types", "id"),
        ]
    );
    assert_eq!(
        incoming(&contacts, "phone_types"),
        vec![Relation::new("id", "phones", "phone_type")]
    );
    assert!(outgoing(&contacts, "contacts").is_empty());
    assert!(outgoing(&contacts, "phone_types").is_empty());
}

#[rstest]
#[case::conventions(InferenceOptions::default())]
#[case::conventions_and_alias(InferenceOptions { aliases: vec![phone_type_alias()], ..InferenceOptions::default() })]
#[case::alias_only(InferenceOptions { aliases: vec![phone_type_alias()], ignore_conventions: true, ..InferenceOptions::default() })]
#[case::custom_affixes(InferenceOptions { prefix: "fk_".to_string(), suffix: "_ref".to_string(), ..InferenceOptions::default() })]
fn second_pass_adds_nothing(mut contacts: Schema, #[case] options: InferenceOptions) {
    infer_by_naming(&mut contacts, &options);
    let after_first = contacts.clone();

    let report = infer_by_naming(&mut contacts, &options);

    assert!(report.is_empty());
    assert_eq!(contacts, after_first);
    assert_eq!(
        serde_json::to_string(&contacts).unwrap(),
        serde_json::to_string(&after_first).unwrap()
    );
}

#[rstest]
#[case::conventions(false)]
#[case::alias_only(true)]
fn mirrors_hold_after_inference(mut contacts: Schema, #[case] ignore_conventions: bool) {
    // a declared relation already present before inference
    contacts.attach_outgoing("phones", Relation::new("contact_id", "contacts", "id"));

    let options = InferenceOptions {
        aliases: vec![phone_type_alias()],
        ignore_conventions,
        ..InferenceOptions::default()
    };
    infer_by_naming(&mut contacts, &options);

    assert_eq!(contacts.missing_mirrors(), vec![]);
    for (name, table) in &contacts.tables {
        for field in table.fields.iter().filter(|f| f.is_foreign_key) {
            assert!(
                table.relations_from_table.iter().any(|r| r.local_field == field.name),
                "{}.{} flagged without an outgoing relation",
                name,
                field.name
            );
        }
    }
}

#[rstest]
#[case("ID_CUSTOMER")]
#[case("id_customer")]
#[case("Id_Customer")]
fn prefix_matching_ignores_case(#[case] column: &str) {
    let mut schema = Schema::new("mysql");
    schema.add_table("customer", Table::new(vec![Field::new("id", "int").key(KeyKind::Primary)]));
    schema.add_table(
        "invoices",
        Table::new(vec![Field::new("id", "int").key(KeyKind::Primary), Field::new(column, "int")]),
    );

    infer_by_naming(&mut schema, &InferenceOptions::default());

    assert_eq!(
        outgoing(&schema, "invoices"),
        vec![Relation::new(column, "customer", "id")]
    );
    assert_eq!(
        incoming(&schema, "customer"),
        vec![Relation::new("id", "invoices", column)]
    );
}

#[rstest]
fn alias_bypasses_convention_toggle(mut contacts: Schema) {
    let options = InferenceOptions {
        aliases: vec![phone_type_alias()],
        ignore_conventions: true,
        ..InferenceOptions::default()
    };

    infer_by_naming(&mut contacts, &options);

    assert_eq!(
        outgoing(&contacts, "phones"),
        vec![Relation::new("phone_type", "phone_types", "id")]
    );
    assert_eq!(contacts.relation_count(), 1);
}

#[rstest]
fn phone_number_is_not_a_foreign_key(mut contacts: Schema) {
    infer_by_naming(&mut contacts, &InferenceOptions::default());

    let phones = &contacts.tables["phones"];
    assert!(!phones.field("phone_number").unwrap().is_foreign_key);
    assert!(phones
        .relations_from_table
        .iter()
        .all(|relation| relation.local_field != "phone_number"));
}

#[test]
fn keyless_table_falls_back_to_id() {
    let mut schema = Schema::new("mysql");
    schema.add_table("regions", Table::new(vec![Field::new("id", "int"), Field::new("name", "text")]));
    schema.add_table("tags", Table::new(vec![Field::new("label", "text")]));
    schema.add_table(
        "stores",
        Table::new(vec![
            Field::new("id", "int").key(KeyKind::Primary),
            Field::new("region_id", "int"),
            Field::new("tag_id", "int"),
        ]),
    );

    let report = infer_by_naming(&mut schema, &InferenceOptions::default());

    assert!(report.warnings.is_empty());
    assert_eq!(
        outgoing(&schema, "stores"),
        vec![Relation::new("region_id", "regions", "id")]
    );
    assert!(incoming(&schema, "tags").is_empty());

    let options = InferenceOptions {
        aliases: vec![Alias::new("stores", "tag_id", "tags", "label")],
        ..InferenceOptions::default()
    };
    infer_by_naming(&mut schema, &options);

    assert_eq!(
        incoming(&schema, "tags"),
        vec![Relation::new("label", "stores", "tag_id")]
    );
    assert!(schema.tables["stores"].field("tag_id").unwrap().is_foreign_key);
}

#[rstest]
fn broken_alias_is_skipped_with_warning(mut contacts: Schema) {
    let options = InferenceOptions {
        aliases: vec![Alias::new("faxes", "contact_id", "contacts", "id"), phone_type_alias()],
        ignore_conventions: true,
        ..InferenceOptions::default()
    };

    let report = infer_by_naming(&mut contacts, &options);

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].to_string().contains("faxes"));
    assert_eq!(contacts.relation_count(), 1);
}
