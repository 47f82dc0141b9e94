use serde::{Deserialize, Serialize};

use super::context::ArchiveStage;

/// How one document left the pipeline. None of these abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Archive, thumbnail and text committed.
    Archived { archive_filename: String },
    /// The parser handled the document but produces no archive for it.
    NoArchiveProduced,
    /// No registered parser supports the mime type.
    NoParser { mime_type: String },
    /// The document disappeared between selection and processing.
    NotFound,
    /// Logged and skipped; `stage` is the last stage reached.
    Failed { stage: ArchiveStage, error: String },
}

impl DocumentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Archived { .. } => "archived",
            Self::NoArchiveProduced => "no_archive",
            Self::NoParser { .. } => "no_parser",
            Self::NotFound => "not_found",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
