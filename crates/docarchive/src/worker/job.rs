use serde::{Deserialize, Serialize};

use crate::pipeline::DocumentOutcome;

/// One unit of work: archive this document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub document_id: i64,
    /// Whether the batch re-archives documents that already have an archive.
    pub overwrite: bool,
}

impl Job {
    pub fn new(document_id: i64, overwrite: bool) -> Self {
        Self {
            document_id,
            overwrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// The worker ran the pipeline to completion.
    Done(DocumentOutcome),
    /// The worker process died or stopped answering while on this job.
    WorkerLost { reason: String },
}

/// A finished job as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub document_id: i64,
    pub result: JobResult,
}

impl Completion {
    pub fn done(document_id: i64, outcome: DocumentOutcome) -> Self {
        Self {
            document_id,
            result: JobResult::Done(outcome),
        }
    }

    pub fn worker_lost(document_id: i64, reason: impl Into<String>) -> Self {
        Self {
            document_id,
            result: JobResult::WorkerLost {
                reason: reason.into(),
            },
        }
    }

    /// Short status label for progress output.
    pub fn label(&self) -> &'static str {
        match &self.result {
            JobResult::Done(outcome) => outcome.label(),
            JobResult::WorkerLost { .. } => "worker_lost",
        }
    }
}
