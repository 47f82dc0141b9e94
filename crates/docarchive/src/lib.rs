pub mod batch;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod index;
pub mod logging;
pub mod parsers;
pub mod pipeline;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use batch::{run_batch, run_worker, BatchOptions};
pub use config::{load_config, Config};
pub use db::Database;
pub use document::{Document, NewDocument};
pub use error::{
    ArchiverError, ConfigError, ParseError, Result, StorageError, WorkerError,
};
pub use index::SearchIndex;
pub use pipeline::{Archiver, DocumentOutcome};
pub use worker::{BatchSummary, ProgressEvent, ProgressReporter};
