//! Document repository storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`. Every worker
//! process opens its own handle; handles are never shared across a
//! process boundary.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

pub mod document_repo;
pub mod error;
pub mod migrations;

pub use error::DatabaseError;

/// How long a writer waits for another process holding the SQLite write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). WAL mode is enabled so readers in one
/// worker process do not block the commit of another.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::prepare(conn)?;
        log::debug!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err` (the `Transaction` is dropped uncommitted). `BEGIN
    /// IMMEDIATE` takes the write lock up front, so two workers cannot both
    /// read a free archive filename and then race to claim it.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
            .map_err(DatabaseError::from)?;

        let value = f(&tx)?;

        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }

    /// Closes the connection if this is the last handle to it.
    ///
    /// The dispatcher calls this before spawning worker processes.
    pub fn close(self) -> Result<(), DatabaseError> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().map_err(|_| DatabaseError::LockPoisoned)?;
                conn.close().map_err(|(_, e)| DatabaseError::Sqlite(e))?;
                log::debug!("Database connection closed");
                Ok(())
            }
            Err(_) => {
                log::debug!("Database handle still shared, dropping this reference only");
                Ok(())
            }
        }
    }
}
