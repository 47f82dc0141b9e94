//! Document repository: CRUD for the `documents` table.
//!
//! There are two write paths. [`save`] is the full update: it rewrites every
//! column, bumps `modified` and runs the archive relocation hook.
//! [`patch_archive_fields`] is a raw column patch that runs no hooks and is
//! what the archive commit uses.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use super::{Database, DatabaseError};
use crate::document::{Document, NamingError, NewDocument};
use crate::error::StorageError;
use crate::storage::filesystem::ensure_parent;
use crate::storage::{MediaStore, MoveJournal};

const COLUMNS: &str = "id, title, mime_type, filename, checksum, content, archive_checksum,
     archive_filename, created, added, modified";

#[derive(Error, Debug)]
pub enum SaveError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn from_row(row: &Row<'_>) -> Result<Document, rusqlite::Error> {
    Ok(Document {
        id: row.get("id")?,
        title: row.get("title")?,
        mime_type: row.get("mime_type")?,
        filename: row.get("filename")?,
        checksum: row.get("checksum")?,
        content: row.get("content")?,
        archive_checksum: row.get("archive_checksum")?,
        archive_filename: row.get("archive_filename")?,
        created: row.get("created")?,
        added: row.get("added")?,
        modified: row.get("modified")?,
    })
}

/// Inserts a new document and returns its id.
pub fn insert(db: &Database, document: &NewDocument) -> Result<i64, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO documents (title, mime_type, filename, checksum, created, added, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                document.title,
                document.mime_type,
                document.filename,
                document.checksum,
                document.created,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Reads a document on an already-borrowed connection or transaction.
pub fn get(conn: &Connection, id: i64) -> Result<Option<Document>, DatabaseError> {
    let document = conn
        .query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", COLUMNS),
            params![id],
            from_row,
        )
        .optional()?;
    Ok(document)
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| get(conn, id))
}

/// Ids of the documents to archive, newest first.
///
/// With an explicit `document_id` the result is that document alone (or
/// nothing if it does not exist), whatever its archive state. Otherwise it
/// is every document without an archive version, or every document when
/// `overwrite` is set.
pub fn candidate_ids(
    db: &Database,
    overwrite: bool,
    document_id: Option<i64>,
) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let ids = match document_id {
            Some(id) => {
                let mut stmt = conn.prepare("SELECT id FROM documents WHERE id = ?1")?;
                let rows = stmt.query_map(params![id], |r| r.get(0))?;
                rows.collect::<Result<Vec<i64>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM documents
                     WHERE ?1 OR archive_filename IS NULL
                     ORDER BY created DESC, id DESC",
                )?;
                let rows = stmt.query_map(params![overwrite], |r| r.get(0))?;
                rows.collect::<Result<Vec<i64>, _>>()?
            }
        };
        Ok(ids)
    })
}

/// Writes the three archive columns without touching anything else.
///
/// Returns the number of rows changed (0 if the document no longer exists).
pub fn patch_archive_fields(
    conn: &Connection,
    id: i64,
    archive_checksum: &str,
    content: &str,
    archive_filename: &str,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE documents SET archive_checksum = ?2, content = ?3, archive_filename = ?4
         WHERE id = ?1",
        params![id, archive_checksum, content, archive_filename],
    )?;
    Ok(changed)
}

/// Whether another document already holds `archive_filename`.
pub fn archive_filename_taken(
    conn: &Connection,
    archive_filename: &str,
    exclude_id: i64,
) -> Result<bool, DatabaseError> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE archive_filename = ?1 AND id != ?2)",
        params![archive_filename, exclude_id],
        |r| r.get(0),
    )?;
    Ok(taken)
}

/// Full save: rewrites every column, bumps `modified`, and moves the
/// archive file if the naming policy now yields a different name (for
/// example after a title change with a `{title}` template).
///
/// The move happens under the media lock inside the transaction and is
/// reverted if the transaction does not commit.
pub fn save(db: &Database, media: &MediaStore, document: &Document) -> Result<Document, SaveError> {
    let mut journal = MoveJournal::new();

    let result = db.with_transaction(|tx| {
        let mut saved = document.clone();
        saved.modified = Utc::now().to_rfc3339();

        tx.execute(
            "UPDATE documents SET title = ?2, mime_type = ?3, filename = ?4, checksum = ?5,
             content = ?6, archive_checksum = ?7, archive_filename = ?8, created = ?9,
             modified = ?10
             WHERE id = ?1",
            params![
                saved.id,
                saved.title,
                saved.mime_type,
                saved.filename,
                saved.checksum,
                saved.content,
                saved.archive_checksum,
                saved.archive_filename,
                saved.created,
                saved.modified,
            ],
        )
        .map_err(DatabaseError::from)?;

        let Some(current) = saved.archive_filename.clone() else {
            return Ok(saved);
        };

        let extension = Path::new(&current)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("pdf")
            .to_string();
        let desired = media
            .naming()
            .unique_archive_filename(tx, media.paths(), &saved, &extension)?;

        if desired != current {
            let _guard = media.lock().acquire()?;
            let from = media.paths().archive_path_for(&current);
            let to = media.paths().archive_path_for(&desired);
            if from.exists() {
                ensure_parent(&to)?;
                journal.move_file(&from, &to)?;
            }
            tx.execute(
                "UPDATE documents SET archive_filename = ?2 WHERE id = ?1",
                params![saved.id, desired],
            )
            .map_err(DatabaseError::from)?;

            log::info!(
                "Relocated archive of document {} from '{}' to '{}'",
                saved.id,
                current,
                desired
            );
            saved.archive_filename = Some(desired);
        }

        Ok(saved)
    });

    match &result {
        Ok(_) => journal.commit(),
        Err(_) if !journal.is_empty() => {
            let _guard = media.lock().acquire()?;
            journal.rollback();
        }
        Err(_) => {}
    }

    result
}
