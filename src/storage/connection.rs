//! Connection lifecycle: open, validate, fall back, swap, close.
//!
//! The open protocol is deliberately defensive because the files under
//! inspection are produced elsewhere and may be locked by another writer,
//! permission-restricted, WAL-journaled or corrupt. A read-write open is
//! attempted first and validated with `PRAGMA quick_check`; on any failure
//! the same path is retried through an immutable read-only URI open with the
//! same check. The manager does not try to distinguish the failure causes;
//! it only distinguishes which mode ended up working.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::models::{AccessMode, DatabaseMetadata};
use crate::storage::archive::ArchivedModel;
use crate::storage::model_cache;
use crate::{Error, Result};

/// File extension marking an object-graph (`CoreData`/`SwiftData`) store.
const STORE_EXTENSION: &str = "store";

enum ConnectionState {
    Closed,
    Open { conn: Connection, mode: AccessMode },
}

/// Exclusive owner of the active connection handle.
///
/// Holds the only long-lived mutable state in the crate: the current
/// [`ConnectionState`] plus the metadata and archived model loaded alongside
/// it. Reconnects follow a strict old-handle-then-new-handle ordering: the
/// previous handle is closed only after the replacement is fully opened,
/// validated and its metadata loaded, so a failed reconnect leaves the
/// previous connection intact and a caller can never observe a connected
/// state with an unusable handle.
pub struct ConnectionManager {
    state: ConnectionState,
    metadata: Option<DatabaseMetadata>,
    model: Option<ArchivedModel>,
}

impl ConnectionManager {
    /// Creates a manager with no open connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Closed,
            metadata: None,
            model: None,
        }
    }

    /// Opens `path`, replacing any current connection on success.
    ///
    /// With `force_read_only` the file is opened through an immutable handle
    /// directly and any failure is fatal. Otherwise a read-write open is
    /// attempted and validated; if either step fails the partially-opened
    /// handle is discarded and the same path is retried immutable, yielding
    /// [`AccessMode::ReadOnlyFallback`] on success.
    ///
    /// For `.store` files the persistence metadata and model cache are
    /// loaded from the new handle before the old one is swapped out; their
    /// failure never fails the connect, it just leaves them absent.
    pub fn connect(&mut self, path: &Path, force_read_only: bool) -> Result<AccessMode> {
        let (conn, mode) = open_validated(path, force_read_only)?;

        let (metadata, model) = if is_store_file(path) {
            model_cache::load(&conn)
        } else {
            (None, None)
        };

        tracing::debug!(path = %path.display(), ?mode, "database opened");

        // The new handle is fully validated; only now retire the old one.
        let previous = std::mem::replace(&mut self.state, ConnectionState::Open { conn, mode });
        if let ConnectionState::Open { conn: old, .. } = previous {
            if let Err((_, err)) = old.close() {
                tracing::warn!(%err, "failed to close previous connection");
            }
        }
        self.metadata = metadata;
        self.model = model;

        Ok(mode)
    }

    /// Releases the handle and clears cached metadata.
    ///
    /// Calling this when already closed is a no-op, not an error.
    pub fn close(&mut self) -> Result<()> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if let ConnectionState::Open { conn, .. } = previous {
            if let Err((_, err)) = conn.close() {
                tracing::warn!(%err, "failed to close connection cleanly");
            }
        }
        self.metadata = None;
        self.model = None;
        Ok(())
    }

    /// The open handle, or [`Error::NotConnected`].
    pub fn connection(&self) -> Result<&Connection> {
        match &self.state {
            ConnectionState::Open { conn, .. } => Ok(conn),
            ConnectionState::Closed => Err(Error::NotConnected),
        }
    }

    /// Access mode of the current connection, if any.
    #[must_use]
    pub fn access_mode(&self) -> Option<AccessMode> {
        match &self.state {
            ConnectionState::Open { mode, .. } => Some(*mode),
            ConnectionState::Closed => None,
        }
    }

    /// Whether a connection is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Open { .. })
    }

    /// Persistence metadata loaded with the current connection.
    #[must_use]
    pub fn metadata(&self) -> Option<&DatabaseMetadata> {
        self.metadata.as_ref()
    }

    /// Archived object-graph model loaded with the current connection.
    #[must_use]
    pub fn model(&self) -> Option<&ArchivedModel> {
        self.model.as_ref()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn is_store_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(STORE_EXTENSION))
}

fn open_validated(path: &Path, force_read_only: bool) -> Result<(Connection, AccessMode)> {
    if force_read_only {
        let conn = open_immutable_checked(path).map_err(|cause| Error::Unopenable {
            path: path.display().to_string(),
            cause,
        })?;
        return Ok((conn, AccessMode::ReadOnlyRequested));
    }

    match open_read_write_checked(path) {
        Ok(conn) => Ok((conn, AccessMode::ReadWrite)),
        Err(rw_cause) => {
            tracing::debug!(
                path = %path.display(),
                cause = %rw_cause,
                "read-write open failed, retrying immutable"
            );
            match open_immutable_checked(path) {
                Ok(conn) => Ok((conn, AccessMode::ReadOnlyFallback)),
                Err(ro_cause) => Err(Error::Unopenable {
                    path: path.display().to_string(),
                    cause: format!(
                        "read-write open failed ({rw_cause}); read-only fallback failed ({ro_cause})"
                    ),
                }),
            }
        },
    }
}

/// Read-write open without `CREATE`: a missing file must fail, not be
/// created empty.
fn open_read_write_checked(path: &Path) -> std::result::Result<Connection, String> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .map_err(|err| err.to_string())?;
    match self_check(&conn) {
        Ok(()) => Ok(conn),
        Err(cause) => {
            // Best effort; the handle is unusable either way.
            let _ = conn.close();
            Err(cause)
        },
    }
}

/// Immutable read-only open through a URI filename. `immutable=1` tells the
/// engine not to take locks or look at journal files, which is what lets a
/// WAL-journaled or writer-locked file still be read.
fn open_immutable_checked(path: &Path) -> std::result::Result<Connection, String> {
    let uri = format!("file:{}?immutable=1", path.display());
    let conn = Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )
    .map_err(|err| err.to_string())?;
    match self_check(&conn) {
        Ok(()) => Ok(conn),
        Err(cause) => {
            let _ = conn.close();
            Err(cause)
        },
    }
}

/// Lightweight integrity probe run once per successful open. Surfaces lock
/// contention and corruption through the normal error channel.
fn self_check(conn: &Connection) -> std::result::Result<(), String> {
    match conn.query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0)) {
        Ok(verdict) if verdict == "ok" => Ok(()),
        Ok(verdict) => Err(format!("integrity check reported: {verdict}")),
        Err(err) => Err(err.to_string()),
    }
}
