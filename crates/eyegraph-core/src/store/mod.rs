//! SQLite-backed graph store.
//!
//! Runtime defaults follow the projection database conventions:
//! - `journal_mode = WAL` so an export can read while a rebuild writes
//! - `busy_timeout` (5s by default) to ride out transient lock contention
//! - `foreign_keys = ON` so deleting a node removes its relationships

pub mod schema;
mod session;
mod statement;
mod value;

pub use session::{Counters, GraphSession, GraphStats, RecordStream};
pub use statement::{NodePattern, Statement};
pub use value::{GraphValue, Node, PropertyMap, PropertyValue, Record, Relationship, StoreId};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::config::StoreConfig;
use crate::error::GraphError;

/// Explicitly constructed handle to the graph store.
///
/// The handle starts disconnected. [`GraphStore::connect`] creates and
/// initializes the store file; afterwards every [`GraphStore::session`] call
/// opens its own connection. [`GraphStore::close`] makes further sessions
/// unavailable.
#[derive(Debug)]
pub struct GraphStore {
    path: PathBuf,
    busy_timeout: Duration,
    connected: AtomicBool,
}

impl GraphStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
            connected: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone(), config.busy_timeout())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Create (if needed) and initialize the store, then mark the handle
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StoreUnavailable`] if the file cannot be created,
    /// opened, configured, or initialized.
    pub fn connect(&self) -> Result<(), GraphError> {
        tracing::info!(path = %self.path.display(), "connecting to graph store");

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                GraphError::unavailable(format!(
                    "create graph store directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let mut conn = Connection::open(&self.path)
            .and_then(|conn| {
                configure_connection(&conn, self.busy_timeout)?;
                Ok(conn)
            })
            .map_err(|err| {
                GraphError::unavailable(format!("open {}: {err}", self.path.display()))
            })?;
        let version = schema::ensure_schema(&mut conn).map_err(|err| {
            GraphError::unavailable(format!("initialize schema {}: {err}", self.path.display()))
        })?;
        drop(conn);

        self.connected.store(true, Ordering::Release);
        tracing::info!(schema_version = version, "graph store connected");
        Ok(())
    }

    /// Mark the handle disconnected. Sessions already handed out keep working
    /// until dropped.
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(path = %self.path.display(), "graph store closed");
        }
    }

    /// Open a scoped session.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StoreUnavailable`] when the handle is not
    /// connected or the store file can no longer be opened.
    pub fn session(&self) -> Result<GraphSession, GraphError> {
        if !self.is_connected() {
            return Err(GraphError::unavailable("graph store is not connected"));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)
            .and_then(|conn| {
                configure_connection(&conn, self.busy_timeout)?;
                Ok(conn)
            })
            .map_err(|err| {
                GraphError::unavailable(format!("open session on {}: {err}", self.path.display()))
            })?;

        Ok(GraphSession::new(conn))
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
