//! Typed cell decoding.
//!
//! Pure functions mapping a column's declared type plus the raw stored cell
//! to a [`Value`]. Decoding is best-effort by contract: a cell that does not
//! fit its declared type becomes [`Value::Null`], never an error, so one
//! malformed cell cannot abort a table fetch.

mod sniff;

pub use sniff::sniff_blob;

use rusqlite::types::ValueRef;

use crate::models::Value;

/// Decodes one cell.
///
/// Dispatch is on the declared type with any trailing `(...)` size suffix
/// stripped (`VARCHAR(255)` dispatches as `VARCHAR`), matched case-sensitively.
/// Unknown declared types, NULL cells and storage/declaration mismatches all
/// decode to [`Value::Null`].
#[must_use]
pub fn decode_cell(decl_type: &str, cell: ValueRef<'_>) -> Value {
    if matches!(cell, ValueRef::Null) {
        return Value::Null;
    }

    match storage_class(decl_type) {
        "SMALLINT" => match cell {
            ValueRef::Integer(i) => i16::try_from(i).map_or(Value::Null, Value::SmallInt),
            _ => Value::Null,
        },
        "INTEGER" => match cell {
            ValueRef::Integer(i) => Value::Integer(i),
            _ => Value::Null,
        },
        "BIGINT" | "FLOAT" => match cell {
            ValueRef::Integer(i) => Value::Float(i as f32),
            ValueRef::Real(r) => Value::Float(r as f32),
            _ => Value::Null,
        },
        "TEXT" | "VARCHAR" | "NVARCHAR" => match cell {
            ValueRef::Text(bytes) => decode_string(bytes).map_or(Value::Null, Value::Text),
            _ => Value::Null,
        },
        "REAL" => match cell {
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Integer(i) => Value::Real(i as f64),
            _ => Value::Null,
        },
        "TIMESTAMP" => match cell {
            ValueRef::Real(r) => Value::Timestamp(r),
            ValueRef::Integer(i) => Value::Timestamp(i as f64),
            _ => Value::Null,
        },
        "BLOB" => match cell {
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => sniff_blob(bytes),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

/// Strips a `(...)` size suffix from a declared type: `VARCHAR(255)` becomes
/// `VARCHAR`.
fn storage_class(decl_type: &str) -> &str {
    match decl_type.find('(') {
        Some(index) => &decl_type[..index],
        None => decl_type,
    }
}

/// Decodes bytes as UTF-8. ASCII needs no separate path: every all-ASCII
/// slice is already valid UTF-8.
pub(crate) fn decode_string(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_strips_size_suffix() {
        assert_eq!(storage_class("VARCHAR(255)"), "VARCHAR");
        assert_eq!(storage_class("INTEGER"), "INTEGER");
        assert_eq!(storage_class(""), "");
    }

    #[test]
    fn test_decode_integer_kinds() {
        assert_eq!(
            decode_cell("INTEGER", ValueRef::Integer(42)),
            Value::Integer(42)
        );
        assert_eq!(
            decode_cell("SMALLINT", ValueRef::Integer(12)),
            Value::SmallInt(12)
        );
        // Out of i16 range decodes to Null instead of wrapping.
        assert_eq!(
            decode_cell("SMALLINT", ValueRef::Integer(70_000)),
            Value::Null
        );
    }

    #[test]
    fn test_decode_float_kinds() {
        assert_eq!(
            decode_cell("FLOAT", ValueRef::Real(1.5)),
            Value::Float(1.5)
        );
        assert_eq!(
            decode_cell("BIGINT", ValueRef::Integer(3)),
            Value::Float(3.0)
        );
        assert_eq!(
            decode_cell("REAL", ValueRef::Real(2.25)),
            Value::Real(2.25)
        );
    }

    #[test]
    fn test_decode_text_kinds() {
        assert_eq!(
            decode_cell("TEXT", ValueRef::Text(b"Ann")),
            Value::Text("Ann".to_string())
        );
        assert_eq!(
            decode_cell("VARCHAR(40)", ValueRef::Text(b"Bo")),
            Value::Text("Bo".to_string())
        );
        // TEXT column holding an integer storage class.
        assert_eq!(decode_cell("TEXT", ValueRef::Integer(1)), Value::Null);
    }

    #[test]
    fn test_decode_timestamp() {
        assert_eq!(
            decode_cell("TIMESTAMP", ValueRef::Real(1_700_000_000.5)),
            Value::Timestamp(1_700_000_000.5)
        );
        assert_eq!(
            decode_cell("TIMESTAMP", ValueRef::Integer(10)),
            Value::Timestamp(10.0)
        );
    }

    #[test]
    fn test_unknown_declared_type_is_null() {
        assert_eq!(decode_cell("GEOMETRY", ValueRef::Integer(1)), Value::Null);
        // Matching is case-sensitive.
        assert_eq!(decode_cell("integer", ValueRef::Integer(1)), Value::Null);
    }

    #[test]
    fn test_null_storage_is_null() {
        assert_eq!(decode_cell("INTEGER", ValueRef::Null), Value::Null);
        assert_eq!(decode_cell("BLOB", ValueRef::Null), Value::Null);
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(decode_string(b"plain"), Some("plain".to_string()));
        assert_eq!(decode_string("caf\u{e9}".as_bytes()), Some("caf\u{e9}".to_string()));
        assert_eq!(decode_string(&[0xFF, 0xFE]), None);
    }
}
