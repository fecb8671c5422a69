//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use repomirror::RepoType;

/// Mirror a model, dataset or space repository with resumable downloads.
#[derive(Debug, Parser)]
#[command(name = "repomirror", version, about)]
pub struct Cli {
    /// Repository id, e.g. `org/name`
    #[arg(long, value_name = "ID")]
    pub repo_id: String,

    /// Repository type
    #[arg(long, value_enum, default_value_t = RepoTypeArg::Model)]
    pub repo_type: RepoTypeArg,

    /// Branch, tag or commit (defaults to `main`)
    #[arg(long)]
    pub revision: Option<String>,

    /// Root directory for mirrors
    #[arg(long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// Access token sent as a bearer credential
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Only download paths matching one of these globs
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    pub allow: Vec<String>,

    /// Skip paths matching any of these globs
    #[arg(long, value_name = "PATTERN", num_args = 1..)]
    pub ignore: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Read size per chunk in MiB
    #[arg(long, value_name = "MB")]
    pub chunk_size_mb: Option<usize>,

    /// Attempts per file before giving up
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Files to download at once
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Hub base URL
    #[arg(long, env = "HF_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Repository type selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RepoTypeArg {
    Model,
    Dataset,
    Space,
}

impl From<RepoTypeArg> for RepoType {
    fn from(arg: RepoTypeArg) -> Self {
        match arg {
            RepoTypeArg::Model => RepoType::Model,
            RepoTypeArg::Dataset => RepoType::Dataset,
            RepoTypeArg::Space => RepoType::Space,
        }
    }
}
