//! Makes the record update and the file placement of an archive commit
//! appear as one step.
//!
//! Order of operations:
//! 1. checksum the archive file where the parser left it
//! 2. in one transaction: pick a unique archive name, patch the three
//!    archive columns, then under the media lock move archive and thumbnail
//!    into place
//! 3. commit
//!
//! Every move is journaled. A file already at a target (re-archiving) is set
//! aside rather than replaced, and only deleted once the transaction has
//! committed. If anything after the first move fails, or the commit itself
//! fails, the moves are reverted under the media lock, set-aside files are
//! put back and the transaction rolls back. A file that cannot be restored is
//! logged as orphaned.

use std::path::Path;

use crate::db::{document_repo, Database};
use crate::document::Document;
use crate::storage::filesystem::{checksum_file, ensure_parent};
use crate::storage::{MediaStore, MoveJournal};

use super::error::CommitError;

pub fn commit_archive(
    db: &Database,
    media: &MediaStore,
    document: &Document,
    content: &str,
    archive_source: &Path,
    thumbnail_source: &Path,
) -> Result<Document, CommitError> {
    let checksum = checksum_file(archive_source).map_err(CommitError::ReadArchive)?;
    let extension = archive_source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf")
        .to_ascii_lowercase();

    let mut journal = MoveJournal::new();

    let result = db.with_transaction(|tx| {
        let archive_filename =
            media
                .naming()
                .unique_archive_filename(tx, media.paths(), document, &extension)?;

        let changed = document_repo::patch_archive_fields(
            tx,
            document.id,
            &checksum,
            content,
            &archive_filename,
        )?;
        if changed == 0 {
            return Err(CommitError::DocumentVanished(document.id));
        }

        let _guard = media.lock().acquire()?;

        let archive_target = media.paths().archive_path_for(&archive_filename);
        let thumbnail_target = media.paths().thumbnail_path(document);
        ensure_parent(&archive_target)?;
        ensure_parent(&thumbnail_target)?;

        journal.move_file(archive_source, &archive_target)?;
        journal.move_file(thumbnail_source, &thumbnail_target)?;

        let mut updated = document.clone();
        updated.archive_checksum = Some(checksum.clone());
        updated.content = Some(content.to_string());
        updated.archive_filename = Some(archive_filename);
        Ok(updated)
    });

    match &result {
        Ok(_) => journal.commit(),
        Err(_) if !journal.is_empty() => revert_moves(media, journal, document.id),
        Err(_) => {}
    }

    result
}

fn revert_moves(media: &MediaStore, journal: MoveJournal, document_id: i64) {
    let pending = journal.len();
    match media.lock().acquire() {
        Ok(_guard) => {
            let orphans = journal.rollback();
            for orphan in &orphans {
                tracing::error!(
                    document_id,
                    file = %orphan.display(),
                    "Orphaned file left in media tree after failed commit"
                );
            }
            tracing::warn!(
                document_id,
                reverted = pending - orphans.len(),
                orphaned = orphans.len(),
                "Reverted file moves of failed commit"
            );
        }
        Err(e) => {
            tracing::error!(
                document_id,
                error = %e,
                orphaned = pending,
                "Could not reacquire media lock, moved files are orphaned"
            );
        }
    }
}
