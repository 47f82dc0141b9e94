//! Full-text search index over archived document content.
//!
//! Lives in its own SQLite database as an FTS5 table keyed by document id,
//! so it can be rebuilt or lag behind the repository without affecting it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection, Transaction};
use thiserror::Error;

use crate::document::Document;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error for index path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search index lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub rank: f64,
}

#[derive(Clone)]
pub struct SearchIndex {
    conn: Arc<Mutex<Connection>>,
}

/// A writer session. Changes become visible when the session commits.
pub struct IndexWriter<'a> {
    tx: Transaction<'a>,
    upserts: usize,
}

impl IndexWriter<'_> {
    /// Replaces whatever the index holds for this document.
    pub fn upsert(&mut self, document: &Document) -> Result<(), IndexError> {
        self.tx.execute(
            "DELETE FROM document_index WHERE rowid = ?1",
            params![document.id],
        )?;
        self.tx.execute(
            "INSERT INTO document_index (rowid, title, content, mime_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                document.id,
                document.title,
                document.content.as_deref().unwrap_or(""),
                document.mime_type,
            ],
        )?;
        self.upserts += 1;
        Ok(())
    }

    pub fn remove(&mut self, document_id: i64) -> Result<(), IndexError> {
        self.tx.execute(
            "DELETE FROM document_index WHERE rowid = ?1",
            params![document_id],
        )?;
        Ok(())
    }
}

impl SearchIndex {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(&conn)?;

        tracing::debug!(path = %path.display(), "Search index opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS document_index
             USING fts5(title, content, mime_type UNINDEXED);",
        )?;
        Ok(())
    }

    /// Runs `f` in a writer session that commits if `f` returns `Ok` and
    /// rolls back otherwise.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, IndexError>
    where
        F: FnOnce(&mut IndexWriter<'_>) -> Result<T, IndexError>,
    {
        let mut conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let mut writer = IndexWriter {
            tx: conn.transaction()?,
            upserts: 0,
        };

        let value = f(&mut writer)?;

        let upserts = writer.upserts;
        writer.tx.commit()?;
        tracing::trace!(upserts, "Index writer committed");
        Ok(value)
    }

    /// Full-text query using FTS5 syntax, best matches first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT rowid, title, rank FROM document_index
             WHERE document_index MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    rank: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    pub fn contains(&self, document_id: i64) -> Result<bool, IndexError> {
        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM document_index WHERE rowid = ?1)",
            params![document_id],
            |r| r.get(0),
        )?;
        Ok(found)
    }

    pub fn document_count(&self) -> Result<usize, IndexError> {
        let conn = self.conn.lock().map_err(|_| IndexError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM document_index", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}
