//! Runs a candidate list through the worker pool and tallies the results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::WorkerError;
use crate::logging::LogControl;
use crate::pipeline::DocumentOutcome;
use crate::worker::job::{Completion, Job, JobResult};
use crate::worker::pool::{WorkerCommand, WorkerPool};
use crate::worker::progress::{ProgressEvent, ProgressReporter};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-outcome counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub archived: usize,
    pub no_archive: usize,
    pub no_parser: usize,
    pub not_found: usize,
    pub failed: usize,
    pub worker_lost: usize,
    pub aborted: bool,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, completion: &Completion) {
        match &completion.result {
            JobResult::Done(DocumentOutcome::Archived { .. }) => self.archived += 1,
            JobResult::Done(DocumentOutcome::NoArchiveProduced) => self.no_archive += 1,
            JobResult::Done(DocumentOutcome::NoParser { .. }) => self.no_parser += 1,
            JobResult::Done(DocumentOutcome::NotFound) => self.not_found += 1,
            JobResult::Done(DocumentOutcome::Failed { .. }) => self.failed += 1,
            JobResult::WorkerLost { .. } => self.worker_lost += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.archived + self.no_archive + self.no_parser + self.not_found + self.failed + self.worker_lost
    }
}

pub struct Dispatcher {
    command: WorkerCommand,
    worker_count: usize,
    interrupt: Arc<AtomicBool>,
    log_control: Option<LogControl>,
}

impl Dispatcher {
    pub fn new(command: WorkerCommand, worker_count: usize, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            command,
            worker_count,
            interrupt,
            log_control: None,
        }
    }

    /// Drop the global log filter to errors-only while the batch runs.
    pub fn with_log_control(mut self, control: LogControl) -> Self {
        self.log_control = Some(control);
        self
    }

    /// Processes every id once. Returns early, without error, when the
    /// interrupt flag is raised; the summary is then marked `aborted`.
    pub fn run(
        &self,
        ids: &[i64],
        overwrite: bool,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchSummary, WorkerError> {
        let total = ids.len();
        let mut summary = BatchSummary::new(total);
        if total == 0 {
            tracing::info!("No documents to archive");
            progress.report(ProgressEvent::Finished);
            return Ok(summary);
        }

        let workers = self.worker_count.clamp(1, total);
        tracing::info!(total, workers, overwrite, "Starting archive batch");

        let _quiet = self.log_control.as_ref().map(LogControl::errors_only);

        let mut pool = WorkerPool::spawn(self.command.clone(), workers);
        for &id in ids {
            pool.submit(Job::new(id, overwrite))?;
        }
        pool.close();

        progress.report(ProgressEvent::Started { total });

        while summary.completed() < total {
            if self.interrupt.load(Ordering::Relaxed) {
                pool.abort();
                summary.aborted = true;
                break;
            }

            match pool.recv_timeout(POLL_INTERVAL) {
                Ok(Some(completion)) => {
                    summary.record(&completion);
                    if let JobResult::WorkerLost { reason } = &completion.result {
                        tracing::error!(
                            document_id = completion.document_id,
                            reason = %reason,
                            "Worker lost while archiving document"
                        );
                    }
                    progress.report(ProgressEvent::Completed {
                        document_id: completion.document_id,
                        label: completion.label(),
                        completed: summary.completed(),
                        total,
                    });
                }
                Ok(None) => continue,
                Err(WorkerError::ChannelClosed) => {
                    tracing::error!(
                        completed = summary.completed(),
                        total,
                        "All workers exited before the batch finished"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        pool.wait();

        if summary.aborted {
            progress.report(ProgressEvent::Aborted {
                completed: summary.completed(),
                total,
            });
        } else {
            progress.report(ProgressEvent::Finished);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ArchiveStage;
    use crate::worker::progress::NoopProgress;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recording {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::new(4);
        summary.record(&Completion::done(
            1,
            DocumentOutcome::Archived {
                archive_filename: "0000001.pdf".to_string(),
            },
        ));
        summary.record(&Completion::done(
            2,
            DocumentOutcome::Failed {
                stage: ArchiveStage::Parsed,
                error: "boom".to_string(),
            },
        ));
        summary.record(&Completion::worker_lost(3, "killed"));
        summary.record(&Completion::done(4, DocumentOutcome::NoArchiveProduced));

        assert_eq!(summary.archived, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.worker_lost, 1);
        assert_eq!(summary.no_archive, 1);
        assert_eq!(summary.completed(), 4);
    }

    #[test]
    fn test_empty_batch_spawns_nothing() {
        let dispatcher = Dispatcher::new(
            WorkerCommand::new("/nonexistent/worker"),
            4,
            Arc::new(AtomicBool::new(false)),
        );
        let progress = Recording(Mutex::new(Vec::new()));
        let summary = dispatcher.run(&[], false, &progress).unwrap();

        assert_eq!(summary, BatchSummary::new(0));
        assert_eq!(*progress.0.lock().unwrap(), vec![ProgressEvent::Finished]);
    }

    #[test]
    fn test_interrupt_before_start_aborts() {
        let dispatcher = Dispatcher::new(
            WorkerCommand::new("/nonexistent/worker"),
            2,
            Arc::new(AtomicBool::new(true)),
        );
        let summary = dispatcher.run(&[1, 2, 3], false, &NoopProgress).unwrap();
        assert!(summary.aborted);
        assert_eq!(summary.total, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_progress_per_document() {
        let script = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed 's/.*"document_id":\([0-9]*\).*/\1/')
  printf '{"document_id":%s,"outcome":{"status":"no_parser","mime_type":"x/y"}}\n' "$id"
done
"#;
        let dispatcher = Dispatcher::new(
            WorkerCommand::new("sh").arg("-c").arg(script),
            8,
            Arc::new(AtomicBool::new(false)),
        );
        let progress = Recording(Mutex::new(Vec::new()));
        let summary = dispatcher.run(&[5, 6, 7], false, &progress).unwrap();

        assert_eq!(summary.no_parser, 3);
        assert!(!summary.aborted);

        let events = progress.0.lock().unwrap();
        assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 3 }));
        assert_eq!(events.last(), Some(&ProgressEvent::Finished));
        let completed: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Completed { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![1, 2, 3]);
    }
}
