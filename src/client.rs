//! Public facade: a command-queue actor owning the connection.
//!
//! The underlying handle is not safe for concurrent use, and the connect
//! protocol's open-new-then-close-old sequencing must never race a second
//! reconnect. Instead of guarding the handle with a lock, all access goes
//! through one worker thread that owns the [`ConnectionManager`] outright and
//! drains a FIFO command channel: concurrent callers queue, operations
//! execute in issue order, and exactly one statement is ever in flight.
//! Long-running steps (open, integrity check, statement execution, blob
//! decompression) therefore never run on a caller's thread.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use crate::models::{
    AccessMode, DatabaseMetadata, DisplayMode, DisplayedObject, EntityDescriptor, Record, Table,
};
use crate::storage::{ConnectionManager, model_cache, records, schema};
use crate::{Error, Result};

/// Commands queued for the worker thread.
type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Connect {
        path: PathBuf,
        force_read_only: bool,
        reply: Reply<AccessMode>,
    },
    Close {
        reply: Reply<()>,
    },
    IsConnected {
        reply: Reply<bool>,
    },
    AccessMode {
        reply: Reply<Option<AccessMode>>,
    },
    ListTables {
        reply: Reply<Vec<String>>,
    },
    DescribeTable {
        name: String,
        reply: Reply<Table>,
    },
    RowCount {
        name: String,
        reply: Reply<i64>,
    },
    FetchRecords {
        table: Table,
        reply: Reply<Vec<Record>>,
    },
    Insert {
        table: Table,
        record: Record,
        reply: Reply<()>,
    },
    Update {
        table: Table,
        record: Record,
        columns: Option<Vec<String>>,
        reply: Reply<()>,
    },
    Delete {
        table: Table,
        records: Vec<Record>,
        reply: Reply<()>,
    },
    LoadObjectGraphSchema {
        reply: Reply<Option<Vec<EntityDescriptor>>>,
    },
    CurrentMetadata {
        reply: Reply<Option<DatabaseMetadata>>,
    },
    CurrentDisplayMode {
        force_sqlite: bool,
        reply: Reply<DisplayMode>,
    },
    DisplayedObjects {
        force_sqlite: bool,
        reply: Reply<Vec<DisplayedObject>>,
    },
}

/// Handle to one inspected database.
///
/// Cheap to clone; all clones feed the same worker and therefore the same
/// connection. Dropping the last clone shuts the worker down, closing any
/// open handle.
#[derive(Clone)]
pub struct DatabaseClient {
    tx: mpsc::Sender<Command>,
}

impl DatabaseClient {
    /// Spawns the connection worker and returns a handle to it.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(32);
        std::thread::spawn(move || run_worker(rx));
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| Error::ClientGone)?;
        response.await.map_err(|_| Error::ClientGone)?
    }

    /// Opens a database file, replacing any current connection on success.
    ///
    /// A `connect` that fails leaves the previous connection (if any) fully
    /// usable. See [`ConnectionManager::connect`] for the open/validate/
    /// fallback protocol.
    pub async fn connect(
        &self,
        path: impl Into<PathBuf>,
        force_read_only: bool,
    ) -> Result<AccessMode> {
        let path = path.into();
        self.request(|reply| Command::Connect {
            path,
            force_read_only,
            reply,
        })
        .await
    }

    /// Closes the current connection. A no-op when already closed.
    pub async fn close(&self) -> Result<()> {
        self.request(|reply| Command::Close { reply }).await
    }

    /// Whether a connection is currently open.
    pub async fn is_connected(&self) -> Result<bool> {
        self.request(|reply| Command::IsConnected { reply }).await
    }

    /// Access mode of the current connection, if any.
    pub async fn access_mode(&self) -> Result<Option<AccessMode>> {
        self.request(|reply| Command::AccessMode { reply }).await
    }

    /// Lists user tables, lexicographically sorted.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.request(|reply| Command::ListTables { reply }).await
    }

    /// Describes one table: columns in catalog order plus a row-count
    /// snapshot.
    pub async fn describe_table(&self, name: impl Into<String>) -> Result<Table> {
        let name = name.into();
        self.request(|reply| Command::DescribeTable { name, reply })
            .await
    }

    /// Counts the rows of a table right now.
    pub async fn row_count(&self, name: impl Into<String>) -> Result<i64> {
        let name = name.into();
        self.request(|reply| Command::RowCount { name, reply })
            .await
    }

    /// Fetches all rows of a table as decoded records.
    pub async fn fetch_records(&self, table: &Table) -> Result<Vec<Record>> {
        let table = table.clone();
        self.request(|reply| Command::FetchRecords { table, reply })
            .await
    }

    /// Inserts a record into a table.
    pub async fn insert_record(&self, table: &Table, record: &Record) -> Result<()> {
        let table = table.clone();
        let record = record.clone();
        self.request(|reply| Command::Insert {
            table,
            record,
            reply,
        })
        .await
    }

    /// Updates a record, optionally restricted to a column subset.
    pub async fn update_record(
        &self,
        table: &Table,
        record: &Record,
        columns: Option<Vec<String>>,
    ) -> Result<()> {
        let table = table.clone();
        let record = record.clone();
        self.request(|reply| Command::Update {
            table,
            record,
            columns,
            reply,
        })
        .await
    }

    /// Deletes records, one statement per record.
    pub async fn delete_records(&self, table: &Table, records: &[Record]) -> Result<()> {
        let table = table.clone();
        let records = records.to_vec();
        self.request(|reply| Command::Delete {
            table,
            records,
            reply,
        })
        .await
    }

    /// Resolves the object-graph schema against the current catalog.
    ///
    /// `None` when the connected file carries no (readable) model cache.
    pub async fn load_object_graph_schema(&self) -> Result<Option<Vec<EntityDescriptor>>> {
        self.request(|reply| Command::LoadObjectGraphSchema { reply })
            .await
    }

    /// Persistence metadata of the connected store, if any.
    pub async fn current_metadata(&self) -> Result<Option<DatabaseMetadata>> {
        self.request(|reply| Command::CurrentMetadata { reply })
            .await
    }

    /// The display convention for the current connection. `force_sqlite`
    /// presents an object-graph store as plain tables anyway.
    pub async fn display_mode(&self, force_sqlite: bool) -> Result<DisplayMode> {
        self.request(|reply| Command::CurrentDisplayMode {
            force_sqlite,
            reply,
        })
        .await
    }

    /// All tables of the connected database, tagged per the display
    /// convention: plain tables, `CoreData` entities or `SwiftData` models.
    pub async fn displayed_objects(&self, force_sqlite: bool) -> Result<Vec<DisplayedObject>> {
        self.request(|reply| Command::DisplayedObjects {
            force_sqlite,
            reply,
        })
        .await
    }
}

impl Default for DatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

fn run_worker(mut rx: mpsc::Receiver<Command>) {
    let mut manager = ConnectionManager::new();

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Connect {
                path,
                force_read_only,
                reply,
            } => {
                let _ = reply.send(manager.connect(&path, force_read_only));
            },
            Command::Close { reply } => {
                let _ = reply.send(manager.close());
            },
            Command::IsConnected { reply } => {
                let _ = reply.send(Ok(manager.is_connected()));
            },
            Command::AccessMode { reply } => {
                let _ = reply.send(Ok(manager.access_mode()));
            },
            Command::ListTables { reply } => {
                let _ = reply.send(manager.connection().and_then(schema::list_tables));
            },
            Command::DescribeTable { name, reply } => {
                let _ = reply.send(
                    manager
                        .connection()
                        .and_then(|conn| schema::describe_table(conn, &name)),
                );
            },
            Command::RowCount { name, reply } => {
                let _ = reply.send(
                    manager
                        .connection()
                        .and_then(|conn| schema::row_count(conn, &name)),
                );
            },
            Command::FetchRecords { table, reply } => {
                let _ = reply.send(
                    manager
                        .connection()
                        .and_then(|conn| records::fetch_records(conn, &table)),
                );
            },
            Command::Insert {
                table,
                record,
                reply,
            } => {
                let _ = reply.send(
                    manager
                        .connection()
                        .and_then(|conn| records::insert(conn, &table, &record)),
                );
            },
            Command::Update {
                table,
                record,
                columns,
                reply,
            } => {
                let _ = reply.send(manager.connection().and_then(|conn| {
                    records::update(conn, &table, &record, columns.as_deref())
                }));
            },
            Command::Delete {
                table,
                records,
                reply,
            } => {
                let _ = reply.send(
                    manager
                        .connection()
                        .and_then(|conn| records::delete(conn, &table, &records)),
                );
            },
            Command::LoadObjectGraphSchema { reply } => {
                let _ = reply.send(load_object_graph_schema(&manager));
            },
            Command::CurrentMetadata { reply } => {
                let _ = reply.send(Ok(manager.metadata().cloned()));
            },
            Command::CurrentDisplayMode {
                force_sqlite,
                reply,
            } => {
                let _ = reply.send(Ok(DisplayMode::select(force_sqlite, manager.metadata())));
            },
            Command::DisplayedObjects {
                force_sqlite,
                reply,
            } => {
                let _ = reply.send(displayed_objects(&manager, force_sqlite));
            },
        }
    }

    // Channel closed: every client handle is gone, release the connection.
    if let Err(err) = manager.close() {
        tracing::warn!(%err, "failed to close connection during shutdown");
    }
}

fn load_object_graph_schema(manager: &ConnectionManager) -> Result<Option<Vec<EntityDescriptor>>> {
    let Some(model) = manager.model() else {
        return Ok(None);
    };
    let conn = manager.connection()?;
    model_cache::resolve_entities(conn, model).map(Some)
}

/// Presents every table under the selected display convention. Entities that
/// resolved from the model cache take their convention's tag; tables with no
/// matching entity stay plain.
fn displayed_objects(
    manager: &ConnectionManager,
    force_sqlite: bool,
) -> Result<Vec<DisplayedObject>> {
    let mode = DisplayMode::select(force_sqlite, manager.metadata());
    let conn = manager.connection()?;

    let entities = match (mode, manager.model()) {
        (DisplayMode::Sqlite, _) | (_, None) => Vec::new(),
        (_, Some(model)) => model_cache::resolve_entities(conn, model)?,
    };

    let mut objects = Vec::new();
    for name in schema::list_tables(conn)? {
        if let Some(entity) = entities.iter().find(|e| e.table.name == name) {
            objects.push(match mode {
                DisplayMode::SwiftData => DisplayedObject::Model(entity.clone()),
                _ => DisplayedObject::Entity(entity.clone()),
            });
        } else {
            objects.push(DisplayedObject::Table(schema::describe_table(conn, &name)?));
        }
    }
    Ok(objects)
}
