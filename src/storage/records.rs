//! Record fetch and mutation.
//!
//! Rows are addressed by the table's primary-key columns when it has any,
//! falling back to the rowid captured at fetch time. A record that carries
//! neither is a caller bug, not a runtime condition: callers must keep the
//! `row_id` of rows fetched from primary-key-less tables.

use std::collections::HashMap;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;

use crate::codec::decode_cell;
use crate::models::{Record, Table, Value};
use crate::storage::quote_identifier;
use crate::{Error, Result};

fn query_err(operation: &str, err: &rusqlite::Error) -> Error {
    Error::Query {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}

fn mutation_err(operation: &str, err: &rusqlite::Error) -> Error {
    Error::Mutation {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}

/// Fetches every row of a table, decoding each declared column.
///
/// The query also captures the engine rowid (`ROWID AS row_id`) so that rows
/// of primary-key-less tables stay addressable for later mutation. A cell
/// that fails to decode becomes [`Value::Null`]; a column missing from the
/// result set entirely is also `Null`.
pub fn fetch_records(conn: &Connection, table: &Table) -> Result<Vec<Record>> {
    let sql = format!(
        "SELECT *, ROWID AS row_id FROM {}",
        quote_identifier(&table.name)
    );
    let mut stmt = conn.prepare(&sql).map_err(|err| query_err("fetch", &err))?;

    let mut rows = stmt.query([]).map_err(|err| query_err("fetch", &err))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(|err| query_err("fetch", &err))? {
        let row_id = row.get::<_, i64>("row_id").ok();

        let mut values = HashMap::with_capacity(table.columns.len());
        for column in &table.columns {
            let value = match row.get_ref(column.name.as_str()) {
                Ok(cell) => decode_cell(&column.decl_type, cell),
                Err(err) => {
                    tracing::warn!(column = column.name, %err, "cell unavailable, storing null");
                    Value::Null
                },
            };
            values.insert(column.name.clone(), value);
        }
        records.push(Record::new(row_id, values));
    }

    Ok(records)
}

/// Inserts a record, binding every table column the record carries a value
/// for. Display-only kinds (`Array`, `Image`) bind as NULL.
pub fn insert(conn: &Connection, table: &Table, record: &Record) -> Result<()> {
    let mut columns = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    for column in &table.columns {
        if let Some(value) = record.values.get(&column.name) {
            columns.push(quote_identifier(&column.name));
            params.push(bind_value(value));
        }
    }

    if columns.is_empty() {
        let sql = format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(&table.name));
        conn.execute(&sql, [])
            .map_err(|err| mutation_err("insert", &err))?;
        return Ok(());
    }

    let placeholders = vec!["?"; params.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(&table.name),
        columns.join(", "),
        placeholders
    );
    tracing::debug!(table = table.name, sql, "insert");

    conn.execute(&sql, rusqlite::params_from_iter(params))
        .map_err(|err| mutation_err("insert", &err))?;
    Ok(())
}

/// Updates a record in place.
///
/// With `columns` the SET clause covers only that subset; otherwise every
/// table column the record carries a value for is written.
///
/// # Panics
///
/// Panics if the record can be addressed neither by primary key nor by
/// rowid; see the module docs.
pub fn update(
    conn: &Connection,
    table: &Table,
    record: &Record,
    columns: Option<&[String]>,
) -> Result<()> {
    let targets: Vec<&str> = match columns {
        Some(subset) => subset.iter().map(String::as_str).collect(),
        None => table
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect(),
    };

    let mut assignments = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    for name in targets {
        if let Some(value) = record.values.get(name) {
            assignments.push(format!("{} = ?", quote_identifier(name)));
            params.push(bind_value(value));
        }
    }

    if assignments.is_empty() {
        return Ok(());
    }

    let predicate = where_clause(table, record, &mut params);
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_identifier(&table.name),
        assignments.join(", "),
        predicate
    );
    tracing::debug!(table = table.name, sql, "update");

    conn.execute(&sql, rusqlite::params_from_iter(params))
        .map_err(|err| mutation_err("update", &err))?;
    Ok(())
}

/// Deletes records, issuing one statement per record.
///
/// Per-record statements (rather than one OR-combined predicate) keep
/// per-row side effects such as triggers firing exactly once per addressed
/// row, and a failure part-way leaves earlier deletions applied.
///
/// # Panics
///
/// Panics if any record can be addressed neither by primary key nor by
/// rowid; see the module docs.
pub fn delete(conn: &Connection, table: &Table, records: &[Record]) -> Result<()> {
    for record in records {
        let mut params: Vec<SqlValue> = Vec::new();
        let predicate = where_clause(table, record, &mut params);
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(&table.name),
            predicate
        );
        tracing::debug!(table = table.name, sql, "delete");

        conn.execute(&sql, rusqlite::params_from_iter(params))
            .map_err(|err| mutation_err("delete", &err))?;
    }
    Ok(())
}

/// Converts a decoded value back to a driver value for binding. `Array` and
/// `Image` have no write path and bind as NULL.
fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::SmallInt(i) => SqlValue::Integer(i64::from(*i)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(f64::from(*f)),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(t) => SqlValue::Real(*t),
        Value::Array(_) | Value::Image { .. } | Value::Null => SqlValue::Null,
    }
}

/// Builds the addressing predicate for one record, appending its parameters.
///
/// All primary-key columns the record has values for are conjoined. A record
/// carrying no usable key values falls back to `rowid = ?` even when the
/// table declares a primary key: an unfiltered statement would touch every
/// row, so a stricter predicate is always preferred over none.
fn where_clause(table: &Table, record: &Record, params: &mut Vec<SqlValue>) -> String {
    let mut predicates = Vec::new();
    for column in table.primary_key_columns() {
        if let Some(value) = record.values.get(&column.name) {
            predicates.push(format!("{} = ?", quote_identifier(&column.name)));
            params.push(bind_value(value));
        }
    }
    if !predicates.is_empty() {
        return predicates.join(" AND ");
    }

    match record.row_id {
        Some(row_id) => {
            params.push(SqlValue::Integer(row_id));
            "rowid = ?".to_string()
        },
        None => panic!(
            "record in table '{}' has neither primary-key values nor a rowid",
            table.name
        ),
    }
}
