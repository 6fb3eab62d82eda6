//! Database access: connection lifecycle, catalog introspection, model-cache
//! extraction and record fetch/mutation.
//!
//! Everything here operates on a borrowed [`rusqlite::Connection`]; exclusive
//! ownership of the handle lives in [`connection::ConnectionManager`], which
//! in turn is owned by the [`DatabaseClient`](crate::client::DatabaseClient)
//! worker thread.

pub mod archive;
pub mod connection;
pub mod model_cache;
pub mod records;
pub mod schema;

pub use connection::ConnectionManager;

/// Quotes an identifier for interpolation into SQL text.
///
/// Table and column names come from the database's own catalog, but they can
/// still contain quotes or spaces, so they are always double-quoted with
/// embedded quotes doubled.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("people"), "\"people\"");
        assert_eq!(quote_identifier("odd name"), "\"odd name\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
