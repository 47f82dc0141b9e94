//! Tracing subscriber setup.
//!
//! Logs always go to stderr; worker processes use stdout for replies. The
//! filter sits behind a reload layer so a batch run can drop to errors-only
//! while the progress bar is on screen.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Handle for changing the active filter after initialisation.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    directives: String,
    format: LogFormat,
}

/// Restores the previous filter when dropped.
pub struct QuietGuard {
    handle: reload::Handle<EnvFilter, Registry>,
    directives: String,
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `default_directive`. Calling this twice leaves the first subscriber in
/// place.
pub fn init(default_directive: &str, format: LogFormat) -> LogControl {
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_directive.to_string());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (filter_layer, handle) = reload::Layer::new(filter);

    let fmt_layer = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }

    LogControl {
        handle,
        directives,
        format,
    }
}

impl LogControl {
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Only errors pass until the guard is dropped.
    pub fn errors_only(&self) -> QuietGuard {
        if let Err(e) = self.handle.reload(EnvFilter::new("error")) {
            tracing::debug!(error = %e, "Could not lower log verbosity");
        }
        QuietGuard {
            handle: self.handle.clone(),
            directives: self.directives.clone(),
        }
    }
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        let filter = EnvFilter::try_new(&self.directives).unwrap_or_else(|_| EnvFilter::new("info"));
        if let Err(e) = self.handle.reload(filter) {
            tracing::debug!(error = %e, "Could not restore log verbosity");
        }
    }
}
