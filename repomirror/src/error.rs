//! Error types for repository synchronization.
//!
//! Only the fatal class lives in [`SyncError`]: a missing repository, rejected
//! credentials, an unusable local directory. Problems with a single file stay
//! inside that file's retry loop and end up in the run report instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a whole sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The hub has no repository with this id, type and revision.
    #[error("repository not found: {repo}")]
    RepoNotFound { repo: String },

    /// The hub refused the configured credential (or its absence).
    #[error("authentication rejected for {repo} (HTTP {status})")]
    AuthRejected { repo: String, status: u16 },

    /// Every listing strategy failed.
    #[error("failed to list files of {repo}: {reason}")]
    ListingFailed { repo: String, reason: String },

    /// A metadata request returned something unusable.
    #[error("hub request to {url} failed: {reason}")]
    Api { url: String, reason: String },

    /// A local directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// Reading or writing a destination file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The hub endpoint is not a usable base URL.
    #[error("invalid hub endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A listed path would land outside the destination root.
    #[error("refusing unsafe repository path {path:?}")]
    UnsafePath { path: String },

    /// A glob pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The run was cancelled from outside.
    #[error("interrupted")]
    Interrupted,
}

impl SyncError {
    /// Wrap an I/O error on a destination path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the cancellation signal rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// A single request attempt that failed below the HTTP status layer.
///
/// These feed the retry supervisor's "retry as is" path; they are never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connect, read or write exceeded the configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body broke off or ended early.
    #[error("response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout(e.to_string()),
            _ => Self::Body(e.to_string()),
        }
    }
}
