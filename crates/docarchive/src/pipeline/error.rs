use thiserror::Error;

use crate::db::DatabaseError;
use crate::document::NamingError;
use crate::error::{ParseError, StorageError};
use crate::index::IndexError;

use super::context::ArchiveStage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Parsing failed: {0}")]
    Parse(#[source] ParseError),

    #[error("Thumbnail generation failed: {0}")]
    Thumbnail(#[source] ParseError),

    #[error("Archive commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error("Search index update failed: {0}")]
    Index(#[from] IndexError),

    #[error("Panic after stage {stage}: {message}")]
    Panic { stage: ArchiveStage, message: String },
}

#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Failed to checksum archive file: {0}")]
    ReadArchive(#[source] StorageError),

    #[error("{0}")]
    Naming(#[from] NamingError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document {0} no longer exists")]
    DocumentVanished(i64),
}
