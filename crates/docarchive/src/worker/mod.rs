pub mod dispatcher;
pub mod job;
pub mod pool;
pub mod progress;
pub mod protocol;
pub mod selector;

pub use dispatcher::{BatchSummary, Dispatcher};
pub use job::{Completion, Job, JobResult};
pub use pool::{WorkerCommand, WorkerPool};
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter};
pub use protocol::{serve, WorkerReply, WorkerRequest, WORKER_CONFIG_ENV};
pub use selector::select_candidates;
