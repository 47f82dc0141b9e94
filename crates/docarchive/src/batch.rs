//! Entry points behind the `document-archiver` binary.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::error::ArchiverError;
use crate::logging::{LogControl, LogFormat};
use crate::pipeline::Archiver;
use crate::storage::filesystem::ensure_directory;
use crate::worker::{
    protocol, select_candidates, BatchSummary, Dispatcher, ProgressReporter, WorkerCommand,
};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Re-archive documents that already have an archive version.
    pub overwrite: bool,
    /// Restrict the run to this document, whatever its archive state.
    pub document_id: Option<i64>,
    /// Overrides `task_workers` from the config.
    pub workers: Option<usize>,
}

/// Selects candidates and archives them with the current executable's
/// `worker` subcommand as the worker process. Workers log in the same format
/// as the dispatcher.
pub fn run_batch(
    config: &Config,
    options: &BatchOptions,
    interrupt: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
    log_control: Option<LogControl>,
) -> Result<BatchSummary, ArchiverError> {
    let mut command = WorkerCommand::current_exe(config)?;
    if log_control.as_ref().map(LogControl::format) == Some(LogFormat::Json) {
        command = command.arg("--log-json");
    }
    run_batch_with(config, options, command, interrupt, progress, log_control)
}

/// Same as [`run_batch`] with an explicit worker command.
pub fn run_batch_with(
    config: &Config,
    options: &BatchOptions,
    command: WorkerCommand,
    interrupt: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
    log_control: Option<LogControl>,
) -> Result<BatchSummary, ArchiverError> {
    ensure_directory(&config.scratch_directory())?;

    let db = Database::open(&config.database_path())?;
    let ids = select_candidates(&db, options.overwrite, options.document_id)?;
    // Workers open their own connections.
    db.close()?;

    let workers = options.workers.unwrap_or(config.task_workers);
    let mut dispatcher = Dispatcher::new(command, workers, interrupt);
    if let Some(control) = log_control {
        dispatcher = dispatcher.with_log_control(control);
    }

    Ok(dispatcher.run(&ids, options.overwrite, progress)?)
}

/// Worker process body: serves jobs from stdin until it closes.
pub fn run_worker(config: &Config) -> Result<usize, ArchiverError> {
    let archiver = Archiver::from_config(config)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let handled = protocol::serve(&archiver, stdin.lock(), stdout.lock())?;
    tracing::debug!(handled, "Worker input closed");
    Ok(handled)
}
