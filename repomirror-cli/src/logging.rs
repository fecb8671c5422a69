//! Logging setup.
//!
//! Console output goes to stderr through the progress bars so log lines do
//! not tear them. An optional log file receives the same events without ANSI
//! colors.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use indicatif::MultiProgress;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::CliError;

/// Filter directive for a `-v` count.
pub fn default_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("warn,repomirror={}", level)
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the verbosity-derived filter when set. The returned
/// guard must be kept alive until exit so the log file is flushed.
pub fn init(
    verbose: u8,
    log_file: Option<&Path>,
    progress: &MultiProgress,
) -> Result<Option<WorkerGuard>, CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .map_err(|e| CliError::Logging(e.to_string()))?;

    let console = fmt::layer()
        .with_target(false)
        .with_writer(SuspendingWriter::new(progress.clone()));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), CliError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CliError::Logging(format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|e| CliError::Logging(format!("{}: {}", dir.display(), e)))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Stderr writer that hides the progress bars while a line is printed.
#[derive(Clone)]
pub struct SuspendingWriter {
    progress: MultiProgress,
}

impl SuspendingWriter {
    pub fn new(progress: MultiProgress) -> Self {
        Self { progress }
    }
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.progress.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for SuspendingWriter {
    type Writer = SuspendingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
