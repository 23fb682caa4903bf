//! Naming utilities for schema_graph
//!
//! Case-insensitive name comparison and the column names a naming convention
//! expects for a referenced table.

use inflector::Inflector;

/// Canonical form used to compare identifiers
pub fn canonical_name(name: &str) -> String {
    name.to_uppercase()
}

/// Compare two identifiers ignoring case
pub fn names_match(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right) || canonical_name(left) == canonical_name(right)
}

/// Column names that reference `table` under a prefix/suffix convention,
/// in canonical form: `table + suffix` then `prefix + table`.
pub fn convention_names(table: &str, prefix: &str, suffix: &str) -> [String; 2] {
    [
        canonical_name(&format!("{}{}", table, suffix)),
        canonical_name(&format!("{}{}", prefix, table)),
    ]
}

/// Convert a plural name to singular
pub fn singularize(name: &str) -> String {
    let lower = name.to_lowercase();

    // Handle special cases first
    match lower.as_str() {
        "people" => "person".to_string(),
        "children" => "child".to_string(),
        "men" => "man".to_string(),
        "women" => "woman".to_string(),
        "feet" => "foot".to_string(),
        "teeth" => "tooth".to_string(),
        "geese" => "goose".to_string(),
        "mice" => "mouse".to_string(),
        _ => lower.to_singular(),
    }
}

/// Singular form of `table` when it differs from the name itself
pub fn singular_variant(table: &str) -> Option<String> {
    let singular = singularize(table);
    if singular.is_empty() || names_match(&singular, table) {
        None
    } else {
        Some(singular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_ignores_case() {
        assert!(names_match("ID_CUSTOMER", "id_customer"));
        assert!(names_match("Contact_Id", "contact_id"));
        assert!(!names_match("contact_id", "contacts_id"));
    }

    #[test]
    fn test_convention_names() {
        assert_eq!(
            convention_names("customer", "id_", "_id"),
            ["CUSTOMER_ID".to_string(), "ID_CUSTOMER".to_string()]
        );
        assert_eq!(
            convention_names("orders", "fk_", ""),
            ["ORDERS".to_string(), "FK_ORDERS".to_string()]
        );
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("contacts"), "contact");
        assert_eq!(singularize("Phones"), "phone");
        assert_eq!(singularize("people"), "person");
    }

    #[test]
    fn test_singular_variant() {
        assert_eq!(singular_variant("contacts"), Some("contact".to_string()));
        assert_eq!(singular_variant("phone_types"), Some("phone_type".to_string()));
        assert_eq!(singular_variant("customer"), None);
    }
}
