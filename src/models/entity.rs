//! Logical entities resolved from an object-graph model cache.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Column, Table};

/// A logical property of an entity, paired with the physical column that
/// stores it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// Logical attribute name from the archived model.
    pub name: String,
    /// Display type derived from the archived attribute type
    /// (`Int`, `Double`, `Date`, `String?`, ...).
    pub type_name: String,
    /// The physical column backing this property.
    pub column: Column,
}

impl Property {
    /// `name: type` form used by display layers.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}: {}", self.name, self.type_name)
    }
}

/// An entity from the object-graph model, resolved against a physical table.
///
/// Produced only for databases carrying model-cache metadata. Properties that
/// could not be resolved to a column are absent from `properties`; the
/// resolution conventions below are heuristics, not guarantees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    /// Entity name from the archived model.
    pub display_name: String,
    /// Resolved properties keyed by logical name, deterministically ordered.
    pub properties: BTreeMap<String, Property>,
    /// The underlying physical table.
    pub table: Table,
}

/// Resolves an entity name to a physical table name.
///
/// The storage convention embeds the entity name in the table name (for
/// `CoreData`, `Person` becomes `ZPERSON`), so the uppercased entity name must
/// appear as a substring of the uppercased table name. `tables` is scanned in
/// order and the first match wins, so passing the lexicographically sorted
/// catalog listing makes collisions deterministic.
#[must_use]
pub fn match_table<'a>(entity_name: &str, tables: &'a [String]) -> Option<&'a String> {
    let needle = entity_name.to_uppercase();
    tables
        .iter()
        .find(|table| table.to_uppercase().contains(&needle))
}

/// Resolves a logical attribute name to a physical column.
///
/// The convention prefixes one character onto the stored column name
/// (`name` is stored as `ZNAME`), so matching drops the first character of
/// the column name and compares case-insensitively. The first matching column
/// in declaration order wins.
#[must_use]
pub fn match_column<'a>(attribute_name: &str, columns: &'a [Column]) -> Option<&'a Column> {
    let needle = attribute_name.to_lowercase();
    columns.iter().find(|column| {
        let mut chars = column.name.chars();
        chars.next();
        chars.as_str().to_lowercase() == needle
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            decl_type: "TEXT".to_string(),
            not_null: false,
            pk: 0,
        }
    }

    #[test]
    fn test_match_table_case_insensitive_substring() {
        let tables = vec!["ZPERSON".to_string(), "ZPET".to_string()];
        assert_eq!(match_table("Person", &tables), Some(&"ZPERSON".to_string()));
        assert_eq!(match_table("pet", &tables), Some(&"ZPET".to_string()));
        assert_eq!(match_table("Order", &tables), None);
    }

    #[test]
    fn test_match_table_first_match_wins() {
        let tables = vec!["ZITEM".to_string(), "ZITEMGROUP".to_string()];
        assert_eq!(match_table("Item", &tables), Some(&"ZITEM".to_string()));
    }

    #[test]
    fn test_match_column_strips_leading_character() {
        let columns = vec![column("Z_PK"), column("ZNAME"), column("ZAGE")];
        assert_eq!(match_column("name", &columns), Some(&columns[1]));
        assert_eq!(match_column("Age", &columns), Some(&columns[2]));
        assert_eq!(match_column("missing", &columns), None);
    }

    #[test]
    fn test_match_column_empty_name() {
        let columns = vec![column("Z")];
        // "Z" minus its first character is "", which only an empty attribute
        // name can match.
        assert_eq!(match_column("", &columns), Some(&columns[0]));
        assert_eq!(match_column("z", &columns), None);
    }
}
