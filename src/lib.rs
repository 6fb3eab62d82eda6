//! # sqlscope
//!
//! Defensive inspector for `SQLite`, `CoreData` and `SwiftData` store files.
//!
//! sqlscope opens SQLite-backed database files that it did not produce
//! (possibly locked, permission-restricted, WAL-journaled or outright
//! corrupt) and exposes their schema and row data as typed values without
//! ever crashing the host process on malformed input.
//!
//! ## Features
//!
//! - Defensive connection lifecycle: read-write open with an integrity
//!   self-check, falling back to an immutable read-only open on failure
//! - Schema introspection straight from the database catalog (tables,
//!   columns, primary-key ranks, row counts)
//! - Typed cell decoding driven by declared column types, including
//!   content sniffing of BLOB cells (images, plist string lists, bracketed
//!   arrays)
//! - Model-cache extraction for `CoreData`/`SwiftData` `.store` files: the
//!   zlib-compressed keyed archive in `Z_MODELCACHE` is decoded just far
//!   enough to recover entity and attribute names
//! - All access serialized through a single worker thread owning the
//!   connection handle, so reconnects can never race the open handle
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlscope::DatabaseClient;
//!
//! let client = DatabaseClient::new();
//! let mode = client.connect("app.sqlite", false).await?;
//! for name in client.list_tables().await? {
//!     let table = client.describe_table(&name).await?;
//!     let records = client.fetch_records(&table).await?;
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

use thiserror::Error as ThisError;

// Module declarations
pub mod client;
pub mod codec;
pub mod models;
pub mod storage;

// Re-exports for convenience
pub use client::DatabaseClient;
pub use models::{
    AccessMode, Column, DatabaseMetadata, DisplayMode, DisplayedObject, EntityDescriptor,
    ImageFormat, Property, Record, Table, Value,
};

/// Error type for sqlscope operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Unopenable` | Both read-write and read-only opens failed, or a forced read-only open failed |
/// | `NotConnected` | A query or mutation was issued with no open handle |
/// | `Metadata` | The model cache or store metadata is unavailable or corrupt (internal, degrades) |
/// | `Query` | A catalog or fetch statement failed |
/// | `Mutation` | An insert/update/delete statement failed |
/// | `ClientGone` | The connection worker shut down while a request was pending |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The file could not be opened in any supported access mode.
    ///
    /// Raised when:
    /// - The read-write open failed *and* the immutable read-only retry failed
    /// - A forced read-only open failed
    /// - The integrity self-check failed on every handle that did open
    #[error("cannot open database '{path}': {cause}")]
    Unopenable {
        /// Path of the file that failed to open.
        path: String,
        /// The underlying driver error.
        cause: String,
    },

    /// An operation was attempted with no open connection.
    ///
    /// Always avoidable by checking connection state first; a failed
    /// `connect` never tears down a previously working connection.
    #[error("no database connection available")]
    NotConnected,

    /// Store metadata or the model cache could not be read.
    ///
    /// Never surfaced by public operations: metadata failures degrade to
    /// "no object-graph schema" at the call site.
    #[error("store metadata unavailable: {cause}")]
    Metadata {
        /// What went wrong while probing the reserved tables.
        cause: String,
    },

    /// A catalog or fetch statement failed.
    ///
    /// Raised when the schema listing, column introspection, row count or
    /// record fetch cannot execute (for example the table was dropped
    /// between introspection and fetch).
    #[error("query '{operation}' failed: {cause}")]
    Query {
        /// The query kind that failed.
        operation: String,
        /// The underlying driver error.
        cause: String,
    },

    /// An insert, update or delete statement failed.
    ///
    /// Surfaced to the caller as-is; there is no automatic retry.
    #[error("mutation '{operation}' failed: {cause}")]
    Mutation {
        /// The statement kind that failed (insert/update/delete).
        operation: String,
        /// The underlying driver error.
        cause: String,
    },

    /// The connection worker is gone and can no longer service requests.
    ///
    /// Raised when the client is used after its worker thread exited.
    #[error("database worker is no longer running")]
    ClientGone,
}

impl Error {
    /// A human-readable recovery suggestion for a propagated error, when one
    /// exists. Intended for display next to the error message itself.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Unopenable { .. } => {
                Some("Check that the file is a SQLite database and that you have permission to read it.")
            },
            Self::NotConnected => Some("Open a database before running queries against it."),
            Self::Mutation { .. } => {
                Some("The database may be open in read-only mode, or a constraint rejected the change.")
            },
            Self::Query { .. } => {
                Some("Re-open the database; its schema may have changed underneath this session.")
            },
            Self::Metadata { .. } | Self::ClientGone => None,
        }
    }
}

/// Result type alias for sqlscope operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Unopenable {
            path: "/tmp/missing.sqlite".to_string(),
            cause: "unable to open database file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot open database '/tmp/missing.sqlite': unable to open database file"
        );

        let err = Error::Mutation {
            operation: "delete".to_string(),
            cause: "constraint failed".to_string(),
        };
        assert_eq!(err.to_string(), "mutation 'delete' failed: constraint failed");

        assert_eq!(
            Error::NotConnected.to_string(),
            "no database connection available"
        );
    }

    #[test]
    fn test_recovery_suggestions() {
        assert!(Error::NotConnected.recovery_suggestion().is_some());
        assert!(
            Error::Metadata {
                cause: "no Z_METADATA table".to_string()
            }
            .recovery_suggestion()
            .is_none()
        );
    }
}
