//! Line-delimited JSON spoken between the dispatcher and worker processes.
//!
//! The dispatcher writes one [`WorkerRequest`] per line to the worker's
//! stdin and reads exactly one [`WorkerReply`] line back from its stdout
//! before sending the next. Logs never go to stdout.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::pipeline::{DocumentHandler, DocumentOutcome};
use crate::worker::job::Job;

/// Environment variable carrying the JSON config into worker processes.
pub const WORKER_CONFIG_ENV: &str = "DOCARCHIVE_WORKER_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub document_id: i64,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub document_id: i64,
    pub outcome: DocumentOutcome,
}

impl From<Job> for WorkerRequest {
    fn from(job: Job) -> Self {
        Self {
            document_id: job.document_id,
            overwrite: job.overwrite,
        }
    }
}

impl From<WorkerRequest> for Job {
    fn from(request: WorkerRequest) -> Self {
        Job::new(request.document_id, request.overwrite)
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, WorkerError> {
    serde_json::to_string(message).map_err(|e| WorkerError::Protocol {
        line: String::new(),
        source: e,
    })
}

pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, WorkerError> {
    serde_json::from_str(line.trim_end()).map_err(|e| WorkerError::Protocol {
        line: line.trim_end().to_string(),
        source: e,
    })
}

/// Worker side: answers requests until `input` reaches EOF. Returns the
/// number of documents handled.
pub fn serve<H, R, W>(handler: &H, input: R, mut output: W) -> Result<usize, WorkerError>
where
    H: DocumentHandler + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: WorkerRequest = decode(&line)?;
        let outcome = handler.handle(&request.into());
        let reply = WorkerReply {
            document_id: request.document_id,
            outcome,
        };
        writeln!(output, "{}", encode(&reply)?)?;
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}
