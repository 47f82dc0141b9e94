use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;
use crate::worker::job::Job;

/// Progress of one document through the archive pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStage {
    Selected,
    Parsed,
    Thumbnailed,
    Committed,
    Indexed,
    Done,
}

impl fmt::Display for ArchiveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Selected => "selected",
            Self::Parsed => "parsed",
            Self::Thumbnailed => "thumbnailed",
            Self::Committed => "committed",
            Self::Indexed => "indexed",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

pub struct ArchiveContext {
    pub job: Job,
    pub logging_group: Uuid,
    pub document: Document,
    pub stage: ArchiveStage,
}

impl ArchiveContext {
    pub fn new(job: Job, logging_group: Uuid, document: Document) -> Self {
        Self {
            job,
            logging_group,
            document,
            stage: ArchiveStage::Selected,
        }
    }

    pub fn advance(&mut self, stage: ArchiveStage) {
        tracing::trace!(from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }
}
