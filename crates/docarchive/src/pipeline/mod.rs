pub mod commit;
pub mod context;
pub mod error;
pub mod outcome;
pub mod runner;

pub use commit::commit_archive;
pub use context::{ArchiveContext, ArchiveStage};
pub use error::{CommitError, PipelineError};
pub use outcome::DocumentOutcome;
pub use runner::Archiver;

use crate::worker::job::Job;

/// Anything that can take a job to completion. Worker processes serve the
/// [`Archiver`]; tests substitute their own.
pub trait DocumentHandler {
    fn handle(&self, job: &Job) -> DocumentOutcome;
}
