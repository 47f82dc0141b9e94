/// Batch progress as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Completed {
        document_id: i64,
        label: &'static str,
        completed: usize,
        total: usize,
    },
    Finished,
    Aborted {
        completed: usize,
        total: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Reporter that discards all events.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
