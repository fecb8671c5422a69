//! A single streamed download attempt.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use super::http::{
    Transport, STATUS_OK, STATUS_PARTIAL_CONTENT, STATUS_RANGE_NOT_SATISFIABLE,
};
use super::plan::TransferPlan;
use super::progress::FileProgress;
use crate::cancel::CancelFlag;
use crate::error::{SyncError, SyncResult, TransportError};

/// Default size of one read from the response body (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Result of one attempt, as seen by the retry supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The body was written completely.
    Success { bytes_written: u64 },
    /// The server rejected the requested range (HTTP 416).
    RangeNotSatisfiable,
    /// Any other status without transfer semantics.
    HttpStatus(u16),
    /// The request or the body stream failed.
    Transport(TransportError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short human-readable description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Success { bytes_written } => format!("wrote {} bytes", bytes_written),
            Self::RangeNotSatisfiable => "range not satisfiable (HTTP 416)".to_string(),
            Self::HttpStatus(code) => format!("HTTP {}", code),
            Self::Transport(e) => e.to_string(),
        }
    }
}

/// Streams one response body into a destination file.
pub struct StreamingTransfer {
    transport: Arc<dyn Transport>,
    chunk_size: usize,
    cancel: CancelFlag,
}

impl StreamingTransfer {
    pub fn new(transport: Arc<dyn Transport>, chunk_size: usize, cancel: CancelFlag) -> Self {
        Self {
            transport,
            chunk_size: chunk_size.max(1),
            cancel,
        }
    }

    /// Run one attempt of `plan` against `url`, writing into `dest`.
    ///
    /// Network failures and unexpected statuses come back as an [`Outcome`].
    /// Only local I/O errors and cancellation are returned as `Err`. The file
    /// is written chunk by chunk, so whatever is on disk after an error is a
    /// prefix of the remote content.
    pub fn attempt(
        &self,
        url: &str,
        plan: &TransferPlan,
        dest: &Path,
        expected_size: Option<u64>,
        progress: &mut FileProgress,
    ) -> SyncResult<Outcome> {
        self.cancel.check()?;

        let requested = plan.range();
        let response = match self.transport.fetch(url, requested) {
            Ok(response) => response,
            Err(e) => return Ok(Outcome::Transport(e)),
        };

        let start = match (response.status, requested) {
            (STATUS_RANGE_NOT_SATISFIABLE, _) => return Ok(Outcome::RangeNotSatisfiable),
            (STATUS_PARTIAL_CONTENT, Some(range)) => {
                if let Some(actual) = response.content_range_start {
                    if actual != range.start {
                        debug!(
                            path = %progress.path(),
                            requested = range.start,
                            actual,
                            "partial response starts at the wrong offset"
                        );
                        return Ok(Outcome::HttpStatus(STATUS_PARTIAL_CONTENT));
                    }
                }
                range.start
            }
            (STATUS_OK, _) => {
                if requested.is_some() {
                    debug!(path = %progress.path(), "server ignored range, rewriting from zero");
                }
                0
            }
            (status, _) => return Ok(Outcome::HttpStatus(status)),
        };

        let mut file = open_destination(dest, start > 0)?;
        progress.begin(start, expected_size);

        let mut body = response.body;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;
        // Bytes past a known size are never written.
        let limit = expected_size.map(|size| size.saturating_sub(start));

        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Ok(Outcome::Transport(e.into())),
            };
            let keep = match limit {
                Some(limit) => (limit - written).min(n as u64) as usize,
                None => n,
            };

            if keep > 0 {
                file.write_all(&buf[..keep])
                    .map_err(|e| SyncError::io(dest, e))?;
                written += keep as u64;
                progress.advance(keep as u64);
                trace!(path = %progress.path(), written, "chunk written");
            }

            if keep < n {
                return Ok(Outcome::Transport(TransportError::Body(format!(
                    "body exceeds expected size of {} bytes",
                    start + written
                ))));
            }

            self.cancel.check()?;
        }

        if let Some(size) = expected_size {
            let reached = start + written;
            if reached < size {
                return Ok(Outcome::Transport(TransportError::Body(format!(
                    "body ended at byte {} of {}",
                    reached, size
                ))));
            }
        }

        Ok(Outcome::Success {
            bytes_written: written,
        })
    }
}

/// Open `dest` for appending to an existing prefix, or truncate it.
fn open_destination(dest: &Path, append: bool) -> SyncResult<File> {
    let result = if append {
        OpenOptions::new().append(true).open(dest)
    } else {
        File::create(dest)
    };
    result.map_err(|e| SyncError::io(dest, e))
}
