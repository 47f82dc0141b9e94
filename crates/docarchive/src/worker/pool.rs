//! Pool of worker processes.
//!
//! Each slot is a feeder thread that owns one child process. The feeder pulls
//! jobs from a shared channel, sends each one to its child and waits for the
//! reply before taking the next. A child that dies or answers garbage costs
//! only the job it was holding: the job completes as `WorkerLost` and the
//! slot starts a fresh process for the next one.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::config::Config;
use crate::error::WorkerError;
use crate::worker::job::{Completion, Job};
use crate::worker::protocol::{self, WorkerReply, WorkerRequest, WORKER_CONFIG_ENV};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Re-runs the current executable with the hidden `worker` subcommand,
    /// handing it the resolved config through the environment.
    pub fn current_exe(config: &Config) -> Result<Self, WorkerError> {
        let exe = std::env::current_exe()?;
        let json = serde_json::to_string(config).map_err(|e| WorkerError::Config(e.to_string()))?;
        Ok(Self::new(exe).arg("worker").env(WORKER_CONFIG_ENV, json))
    }

    fn spawn(&self) -> Result<Child, WorkerError> {
        Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| WorkerError::SpawnFailed(format!("{}: {}", self.program.display(), e)))
    }
}

type ChildSlot = Arc<Mutex<Option<Child>>>;

pub struct WorkerPool {
    job_sender: Option<Sender<Job>>,
    completion_receiver: Receiver<Completion>,
    feeders: Vec<JoinHandle<()>>,
    children: Vec<ChildSlot>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` feeder slots. Processes are spawned lazily when
    /// a slot receives its first job.
    pub fn spawn(command: WorkerCommand, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = unbounded::<Job>();
        let (completion_sender, completion_receiver) = unbounded::<Completion>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let command = Arc::new(command);

        let mut feeders = Vec::with_capacity(worker_count);
        let mut children = Vec::with_capacity(worker_count);

        for slot in 0..worker_count {
            let child: ChildSlot = Arc::new(Mutex::new(None));
            children.push(Arc::clone(&child));

            let feeder = Feeder {
                slot,
                command: Arc::clone(&command),
                jobs: job_receiver.clone(),
                completions: completion_sender.clone(),
                child,
                shutdown: Arc::clone(&shutdown),
            };
            feeders.push(thread::spawn(move || feeder.run()));
        }

        info!("Started {} worker slots", worker_count);

        Self {
            job_sender: Some(job_sender),
            completion_receiver,
            feeders,
            children,
            shutdown,
        }
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }
        match &self.job_sender {
            Some(sender) => sender.send(job).map_err(|_| WorkerError::ChannelClosed),
            None => Err(WorkerError::ChannelClosed),
        }
    }

    /// No more jobs will be submitted. Slots exit once the queue drains.
    pub fn close(&mut self) {
        self.job_sender = None;
    }

    /// `Ok(None)` on timeout. `Err(ChannelClosed)` once every slot has exited
    /// and all completions were received.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Completion>, WorkerError> {
        match self.completion_receiver.recv_timeout(timeout) {
            Ok(completion) => Ok(Some(completion)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::ChannelClosed),
        }
    }

    /// Stops taking jobs and kills every running worker process.
    pub fn abort(&mut self) {
        info!("Aborting worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        self.job_sender = None;
        for slot in &self.children {
            if let Some(child) = lock_slot(slot).as_mut() {
                if let Err(e) = child.kill() {
                    debug!("Worker process already gone: {}", e);
                }
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Joins every slot. Children are reaped by their slot on the way out.
    pub fn wait(mut self) {
        self.job_sender = None;
        for (i, feeder) in self.feeders.drain(..).enumerate() {
            if let Err(e) = feeder.join() {
                error!("Worker slot {} panicked: {:?}", i, e);
            } else {
                debug!("Worker slot {} finished", i);
            }
        }
        info!("All workers have stopped");
    }
}

fn lock_slot(slot: &ChildSlot) -> MutexGuard<'_, Option<Child>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct WorkerIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerIo {
    fn exchange(&mut self, job: Job) -> Result<WorkerReply, WorkerError> {
        let request = protocol::encode(&WorkerRequest::from(job))?;
        writeln!(self.stdin, "{}", request)?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(WorkerError::WorkerExited {
                document_id: job.document_id,
            });
        }

        let reply: WorkerReply = protocol::decode(&line)?;
        if reply.document_id != job.document_id {
            return Err(WorkerError::ReplyMismatch {
                expected: job.document_id,
                got: reply.document_id,
            });
        }
        Ok(reply)
    }
}

struct Feeder {
    slot: usize,
    command: Arc<WorkerCommand>,
    jobs: Receiver<Job>,
    completions: Sender<Completion>,
    child: ChildSlot,
    shutdown: Arc<AtomicBool>,
}

impl Feeder {
    fn run(self) {
        debug!("Worker slot {} started", self.slot);
        let mut io: Option<WorkerIo> = None;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker slot {} received shutdown signal", self.slot);
                break;
            }

            let job = match self.jobs.recv_timeout(POLL_INTERVAL) {
                Ok(job) => job,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Worker slot {} job channel disconnected", self.slot);
                    break;
                }
            };

            let attempt = self.exchange(&mut io, job);

            let completion = match attempt {
                Ok(reply) => Completion::done(job.document_id, reply.outcome),
                Err(e) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    warn!(
                        "Worker slot {} lost document {}: {}",
                        self.slot, job.document_id, e
                    );
                    io = None;
                    self.reap();
                    Completion::worker_lost(job.document_id, e.to_string())
                }
            };

            if let Err(e) = self.completions.send(completion) {
                error!("Worker slot {} failed to send completion: {}", self.slot, e);
                break;
            }
        }

        // Closing stdin lets a healthy worker finish its read loop.
        drop(io);
        self.reap_after_exit();
        debug!("Worker slot {} stopped", self.slot);
    }

    fn exchange(&self, io: &mut Option<WorkerIo>, job: Job) -> Result<WorkerReply, WorkerError> {
        if io.is_none() {
            *io = Some(self.start()?);
        }
        match io.as_mut() {
            Some(worker) => worker.exchange(job),
            None => Err(WorkerError::ChannelClosed),
        }
    }

    fn start(&self) -> Result<WorkerIo, WorkerError> {
        let mut child = self.command.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let pid = child.id();
        *lock_slot(&self.child) = Some(child);

        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => {
                debug!("Worker slot {} spawned process {}", self.slot, pid);
                Ok(WorkerIo {
                    stdin,
                    stdout: BufReader::new(stdout),
                })
            }
            _ => {
                self.reap();
                Err(WorkerError::SpawnFailed(
                    "worker process has no stdio pipes".to_string(),
                ))
            }
        }
    }

    fn reap(&self) {
        if let Some(mut child) = lock_slot(&self.child).take() {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!("Worker slot {} process exited: {}", self.slot, status),
                Err(e) => warn!("Worker slot {} could not reap process: {}", self.slot, e),
            }
        }
    }

    fn reap_after_exit(&self) {
        if let Some(mut child) = lock_slot(&self.child).take() {
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => debug!("Worker slot {} process exited: {}", self.slot, status),
                Err(e) => warn!("Worker slot {} could not reap process: {}", self.slot, e),
            }
        }
    }
}
