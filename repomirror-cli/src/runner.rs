//! Runs one sync from parsed arguments.

use std::path::Path;
use std::process::{self, ExitCode};
use std::sync::Arc;
use std::time::Duration;

use repomirror::{
    format_size, CancelFlag, ConfigFile, RepoRef, RepoSync, SyncConfig, SyncError, SyncReport,
    SyncRequest,
};
use tracing::info;

use crate::args::Cli;
use crate::error::CliError;
use crate::logging;
use crate::progress::{multi_progress, IndicatifSink};

/// Exit code for setup and fatal errors.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code after an interrupt, as shells report for SIGINT.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Run the sync described by `cli`.
pub fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let multi = multi_progress(!cli.no_progress);
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref(), &multi)?;

    let file = load_config_file(cli.config.as_deref())?;
    let config = build_config(&cli, &file);
    let request = build_request(&cli, &config);

    let cancel = CancelFlag::new();
    install_signal_handler(cancel.clone())?;

    let sink = Arc::new(IndicatifSink::new(multi));
    let sync = RepoSync::from_config(&config)?
        .with_progress(sink.clone())
        .with_cancel(cancel);

    info!(
        repo = %request.repo,
        endpoint = %config.endpoint,
        local_dir = %config.local_dir.display(),
        parallel = config.parallel,
        authenticated = config.token.is_some(),
        "starting sync"
    );

    let result = sync.sync(&request);
    sink.finish();

    match result {
        Ok(report) => {
            for line in summary_lines(&report) {
                println!("{}", line);
            }
            if report.cancelled {
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(SyncError::Interrupted) => {
            eprintln!("Interrupted before any file was processed.");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the explicit config file, or the default one when it exists.
fn load_config_file(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let file = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(file)
}

/// Layer CLI flags (and their environment fallbacks) over the config file.
pub fn build_config(cli: &Cli, file: &ConfigFile) -> SyncConfig {
    let mut config = file.apply_to(SyncConfig::default());

    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if cli.token.is_some() {
        config = config.with_token(cli.token.clone());
    }
    if let Some(dir) = &cli.local_dir {
        config = config.with_local_dir(dir.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(mb) = cli.chunk_size_mb {
        config = config.with_chunk_size(mb.saturating_mul(1024 * 1024));
    }
    if let Some(n) = cli.max_attempts {
        config = config.with_max_attempts(n);
    }
    if let Some(n) = cli.parallel {
        config = config.with_parallel(n);
    }
    config
}

fn build_request(cli: &Cli, config: &SyncConfig) -> SyncRequest {
    let repo = RepoRef::new(cli.repo_id.clone(), cli.repo_type.into())
        .with_revision(cli.revision.clone());

    SyncRequest::new(repo, config.local_dir.clone())
        .with_allow(cli.allow.clone())
        .with_ignore(cli.ignore.clone())
}

/// First Ctrl+C stops after the current chunk; a second one exits at once.
fn install_signal_handler(cancel: CancelFlag) -> Result<(), CliError> {
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            process::exit(i32::from(EXIT_INTERRUPTED));
        }
        eprintln!();
        eprintln!("Received interrupt, stopping after the current chunk...");
        cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// Lines of the end-of-run summary.
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "Sync Summary".to_string(),
        "────────────".to_string(),
        format!("  Repository:  {}", report.repo),
        format!("  Destination: {}", report.destination.display()),
        format!(
            "  Files:       {} of {} processed ({} downloaded, {} up to date, {} failed)",
            report.processed(),
            report.selected,
            report.downloaded(),
            report.skipped(),
            report.failure_count()
        ),
        format!(
            "  Data:        {} received, {} on disk",
            format_size(report.received_bytes),
            format_size(report.completed_bytes)
        ),
    ];

    if report.has_failures() {
        lines.push(String::new());
        lines.push("Failed files:".to_string());
        for file in report.failures() {
            lines.push(format!("  {} - {}", file.path, file.status));
        }
    }

    if report.cancelled {
        lines.push(String::new());
        lines.push(format!(
            "Interrupted with {} file(s) remaining. Run again to resume.",
            report.selected - report.processed()
        ));
    }

    lines
}
