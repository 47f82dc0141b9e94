use crate::db::{document_repo, Database, DatabaseError};

/// Ids of the documents a batch should process, newest first.
///
/// Without `overwrite` only documents lacking an archive are chosen. A
/// `document_id` narrows the batch to that one document, and it is chosen
/// regardless of its archive state. An id that does not exist yields an
/// empty batch.
pub fn select_candidates(
    db: &Database,
    overwrite: bool,
    document_id: Option<i64>,
) -> Result<Vec<i64>, DatabaseError> {
    let _span = tracing::info_span!("select", overwrite, document_id).entered();

    let ids = document_repo::candidate_ids(db, overwrite, document_id)?;
    tracing::info!(count = ids.len(), "Selected documents for archiving");
    Ok(ids)
}
