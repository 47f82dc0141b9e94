//! document-archiver: generate archive versions for documents that lack one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use docarchive::config::{default_config_path, load_config, validate_config};
use docarchive::logging::{self, LogFormat};
use docarchive::worker::WORKER_CONFIG_ENV;
use docarchive::{run_batch, run_worker, BatchOptions, BatchSummary, Config, ProgressEvent, ProgressReporter};

#[derive(Parser)]
#[command(name = "document-archiver")]
#[command(about = "Generate archive versions (normalized file, text, thumbnail) for stored documents")]
#[command(version)]
struct Cli {
    /// Recreate archive versions for documents that already have one
    #[arg(short = 'f', long)]
    overwrite: bool,

    /// Only process the document with this id, whatever its archive state
    #[arg(short, long, value_name = "ID")]
    document: Option<i64>,

    /// Config file (default: ~/.docarchive/config.json)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of worker processes (default: task_workers from the config)
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve archive jobs over stdin/stdout (started by the batch run)
    #[command(hide = true)]
    Worker,
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        Self { bar }
    }
}

impl ProgressReporter for BarProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => {
                self.bar.set_length(total as u64);
                self.bar.enable_steady_tick(Duration::from_millis(120));
            }
            ProgressEvent::Completed {
                label, completed, ..
            } => {
                self.bar.set_position(completed as u64);
                self.bar.set_message(label);
            }
            ProgressEvent::Finished => self.bar.finish_and_clear(),
            ProgressEvent::Aborted { .. } => self.bar.abandon(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };

    match cli.command {
        Some(Command::Worker) => worker_main(format),
        None => batch_main(&cli, format),
    }
}

fn batch_main(cli: &Cli, format: LogFormat) -> Result<()> {
    let log_control = logging::init("info", format);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path().context("Could not determine home directory")?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::info!(config = %config_path.display(), "Loaded configuration");

    if cli.workers == Some(0) {
        bail!("--workers must be at least 1");
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("Failed to install interrupt handler")?;

    let options = BatchOptions {
        overwrite: cli.overwrite,
        document_id: cli.document,
        workers: cli.workers,
    };

    let progress = BarProgress::new();
    let summary = run_batch(
        &config,
        &options,
        Arc::clone(&interrupt),
        &progress,
        Some(log_control),
    )?;

    if summary.aborted {
        println!("Aborting...");
    }
    print_summary(&summary);
    Ok(())
}

fn worker_main(format: LogFormat) -> Result<()> {
    logging::init("error", format);

    // The dispatcher owns interrupt handling and kills workers itself.
    ctrlc::set_handler(|| {}).context("Failed to install interrupt handler")?;

    let raw = std::env::var(WORKER_CONFIG_ENV)
        .with_context(|| format!("{} is not set", WORKER_CONFIG_ENV))?;
    let config: Config = serde_json::from_str(&raw).context("Invalid worker config")?;
    validate_config(&config)?;

    run_worker(&config)?;
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Processed {} of {} documents: {} archived, {} without archive, {} without parser, {} not found, {} failed, {} lost",
        summary.completed(),
        summary.total,
        summary.archived,
        summary.no_archive,
        summary.no_parser,
        summary.not_found,
        summary.failed,
        summary.worker_lost,
    );
}
