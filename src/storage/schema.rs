//! Catalog introspection.
//!
//! Tables, columns and row counts are derived purely from the database's own
//! catalog. Column enumeration is best-effort: a column whose metadata fails
//! to decode is logged and skipped rather than failing the whole table.

use rusqlite::Connection;

use crate::models::{Column, Table};
use crate::storage::quote_identifier;
use crate::{Error, Result};

fn query_err(operation: &str, err: &rusqlite::Error) -> Error {
    Error::Query {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}

/// Lists user tables from the catalog, excluding the engine's reserved
/// `sqlite_` namespace, in lexicographic order.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table'
             AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(|err| query_err("list_tables", &err))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|err| query_err("list_tables", &err))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| query_err("list_tables", &err))?;

    Ok(names)
}

/// Describes one table: columns in declaration order plus a row-count
/// snapshot taken now.
pub fn describe_table(conn: &Connection, name: &str) -> Result<Table> {
    Ok(Table {
        name: name.to_string(),
        columns: table_columns(conn, name)?,
        record_count: row_count(conn, name)?,
    })
}

/// Columns of a table from the engine's introspection pragma, in declared
/// order. A column whose metadata cannot be decoded is skipped.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<Column>> {
    let sql = format!("PRAGMA table_info({})", quote_identifier(table));
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|err| query_err("table_info", &err))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(Column {
                name: row.get("name")?,
                decl_type: row.get("type")?,
                not_null: row.get("notnull")?,
                pk: row.get("pk")?,
            })
        })
        .map_err(|err| query_err("table_info", &err))?;

    let mut columns = Vec::new();
    for row in rows {
        match row {
            Ok(column) => columns.push(column),
            Err(err) => {
                tracing::warn!(table, %err, "skipping undecodable column");
            },
        }
    }
    Ok(columns)
}

/// Full count of rows in a table. O(n) per call; the cost of an accurate
/// count is accepted and nothing is cached.
pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    conn.query_row(&sql, [], |row| row.get(0))
        .map_err(|err| query_err("row_count", &err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE pairs (a INTEGER, b INTEGER, note TEXT, PRIMARY KEY (a, b));
             CREATE TABLE bare (x TEXT);
             INSERT INTO people (id, name) VALUES (1, 'Ann'), (2, 'Bo');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_list_tables_sorted_without_reserved() {
        let conn = sample_db();
        // sqlite_autoindex/sqlite_sequence style names never show up.
        assert_eq!(list_tables(&conn).unwrap(), vec!["bare", "pairs", "people"]);
    }

    #[test]
    fn test_describe_single_column_primary_key() {
        let conn = sample_db();
        let table = describe_table(&conn, "people").unwrap();

        assert_eq!(table.name, "people");
        assert_eq!(table.record_count, 2);
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);

        assert_eq!(table.columns[0].pk, 1);
        assert_eq!(table.columns[0].decl_type, "INTEGER");
        assert!(!table.columns[0].not_null);
        assert_eq!(table.columns[1].pk, 0);
        assert!(table.columns[1].not_null);
    }

    #[test]
    fn test_describe_composite_primary_key() {
        let conn = sample_db();
        let table = describe_table(&conn, "pairs").unwrap();
        let ranks: Vec<i32> = table.columns.iter().map(|c| c.pk).collect();
        assert_eq!(ranks, vec![1, 2, 0]);
    }

    #[test]
    fn test_describe_rowid_only_table() {
        let conn = sample_db();
        let table = describe_table(&conn, "bare").unwrap();
        assert!(table.primary_key_columns().is_empty());
    }

    #[test]
    fn test_row_count_missing_table() {
        let conn = sample_db();
        assert!(matches!(
            row_count(&conn, "ghosts"),
            Err(Error::Query { .. })
        ));
    }
}
