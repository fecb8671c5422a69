//! Repository synchronization.
//!
//! [`RepoSync`] lists a repository, filters the listing and drives the
//! transfer engine for each selected file, sequentially or with a bounded
//! worker pool.

pub mod layout;
pub mod orchestrator;
pub mod report;
pub mod strategy;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::repo::RepoRef;

pub use layout::{destination_for, destination_root, escape_repo_id};
pub use orchestrator::RepoSync;
pub use report::{format_size, FileReport, FileStatus, SyncReport};
pub use strategy::{ParallelStrategy, SequentialStrategy, StrategyOutcome, SyncStrategy};

/// What to mirror and where.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub repo: RepoRef,
    pub local_dir: PathBuf,
    /// Glob patterns a path must match at least one of; empty means all.
    pub allow: Vec<String>,
    /// Glob patterns that exclude a path.
    pub ignore: Vec<String>,
}

impl SyncRequest {
    pub fn new(repo: RepoRef, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            local_dir: local_dir.into(),
            allow: Vec::new(),
            ignore: Vec::new(),
        }
    }

    pub fn with_allow(mut self, patterns: Vec<String>) -> Self {
        self.allow = patterns;
        self
    }

    pub fn with_ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore = patterns;
        self
    }
}

/// Transfer tuning for a [`RepoSync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub chunk_size: usize,
    pub max_attempts: u32,
    pub parallel: usize,
    pub retry_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_attempts: config.max_attempts,
            parallel: config.parallel,
            retry_delay: config.retry_delay,
        }
    }
}
