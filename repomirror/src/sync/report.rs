//! End-of-run reporting.

use std::fmt;
use std::path::PathBuf;

use crate::repo::RepoRef;

/// Final status of one file in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Transferred during this run; `bytes` is the final length on disk.
    Downloaded { bytes: u64, attempts: u32 },
    /// Already complete locally.
    Skipped { bytes: u64 },
    /// Retry budget exhausted or the path was rejected.
    Failed { reason: String, attempts: u32 },
}

impl FileStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Final length on disk for files that are complete.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Downloaded { bytes, .. } | Self::Skipped { bytes } => Some(*bytes),
            Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloaded { bytes, attempts } if *attempts > 1 => write!(
                f,
                "downloaded {} after {} attempts",
                format_size(*bytes),
                attempts
            ),
            Self::Downloaded { bytes, .. } => write!(f, "downloaded {}", format_size(*bytes)),
            Self::Skipped { bytes } => write!(f, "up to date ({})", format_size(*bytes)),
            Self::Failed { reason, attempts } => {
                write!(f, "failed after {} attempt(s): {}", attempts, reason)
            }
        }
    }
}

/// Outcome of one selected file.
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Repo-relative path.
    pub path: String,
    pub destination: PathBuf,
    /// Remote size after probing, if it became known.
    pub size: Option<u64>,
    pub status: FileStatus,
}

/// Summary of a sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub repo: RepoRef,
    /// Destination root of the mirror.
    pub destination: PathBuf,
    /// Commit the hub resolved the revision to, when reported.
    pub commit: Option<String>,
    /// Per-file results in listing order; files never reached are absent.
    pub files: Vec<FileReport>,
    /// Files selected by the filter.
    pub selected: usize,
    /// Aggregate completed counter at the end of the run.
    pub completed_bytes: u64,
    /// Aggregate total at the end of the run.
    pub total_bytes: Option<u64>,
    /// Bytes received over the network.
    pub received_bytes: u64,
    /// The run stopped early on request.
    pub cancelled: bool,
}

impl SyncReport {
    pub fn processed(&self) -> usize {
        self.files.len()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped { .. }))
    }

    pub fn failure_count(&self) -> usize {
        self.count(FileStatus::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.status.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Every selected file is complete on disk.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.processed() == self.selected && !self.has_failures()
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}

/// Format a size in bytes as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
