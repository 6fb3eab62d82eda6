//! Catalog-derived table and column descriptions.

use serde::Serialize;

/// A single column as declared in the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    /// Declared column name.
    pub name: String,
    /// Declared type string, kept verbatim (e.g. `VARCHAR(255)`).
    pub decl_type: String,
    /// Whether the column carries a NOT NULL constraint.
    pub not_null: bool,
    /// Primary-key rank: 0 when the column is not part of the primary key,
    /// otherwise the 1-based position within the key (composite keys have
    /// several columns with positive rank).
    pub pk: i32,
}

impl Column {
    /// Whether this column is part of the table's primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.pk > 0
    }
}

/// A user table with its columns and a row-count snapshot.
///
/// Equality is structural: two `Table`s compare equal when name, columns and
/// count all match. `record_count` is computed at introspection time and is
/// not kept live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Table name as it appears in the catalog.
    pub name: String,
    /// Columns in catalog declaration order.
    pub columns: Vec<Column>,
    /// Row count at the time the table was introspected.
    pub record_count: i64,
}

impl Table {
    /// The columns participating in the primary key, in declaration order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, pk: i32) -> Column {
        Column {
            name: name.to_string(),
            decl_type: "INTEGER".to_string(),
            not_null: false,
            pk,
        }
    }

    #[test]
    fn test_primary_key_columns() {
        let table = Table {
            name: "pairs".to_string(),
            columns: vec![column("a", 1), column("b", 2), column("c", 0)],
            record_count: 0,
        };
        let pk: Vec<&str> = table
            .primary_key_columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(pk, vec!["a", "b"]);
    }

    #[test]
    fn test_structural_equality() {
        let a = Table {
            name: "t".to_string(),
            columns: vec![column("x", 0)],
            record_count: 3,
        };
        let b = a.clone();
        assert_eq!(a, b);

        let mut c = a.clone();
        c.record_count = 4;
        assert_ne!(a, c);
    }
}
