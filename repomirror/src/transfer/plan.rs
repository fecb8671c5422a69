//! Range negotiation: what to do with a destination given local and remote sizes.
//!
//! | local bytes | remote size | plan |
//! |---|---|---|
//! | 0 | any | restart |
//! | == size | known | skip |
//! | < size | known | resume at local bytes, range `[local, size-1]` |
//! | > size | known | restart (stale or corrupt local file) |
//! | > 0 | unknown | restart (no trusted upper bound) |

use super::http::ByteRange;

/// What a transfer attempt does with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// Local file is already complete.
    Skip,
    /// Append the missing suffix starting at `offset`.
    Resume { offset: u64 },
    /// Discard local bytes and download from zero.
    Restart,
}

/// A transfer decision together with the byte range to request.
///
/// Derived fresh for every attempt; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub action: TransferAction,
    pub range_start: Option<u64>,
    pub range_end: Option<u64>,
}

impl TransferPlan {
    pub fn skip() -> Self {
        Self {
            action: TransferAction::Skip,
            range_start: None,
            range_end: None,
        }
    }

    pub fn restart() -> Self {
        Self {
            action: TransferAction::Restart,
            range_start: None,
            range_end: None,
        }
    }

    /// Resume at `offset` up to the last byte of a file of `remote_size` bytes.
    ///
    /// Only meaningful for `0 < offset < remote_size`.
    pub fn resume(offset: u64, remote_size: u64) -> Self {
        Self {
            action: TransferAction::Resume { offset },
            range_start: Some(offset),
            range_end: Some(remote_size - 1),
        }
    }

    pub fn is_skip(&self) -> bool {
        self.action == TransferAction::Skip
    }

    pub fn is_restart(&self) -> bool {
        self.action == TransferAction::Restart
    }

    /// First byte the attempt writes.
    pub fn offset(&self) -> u64 {
        match self.action {
            TransferAction::Resume { offset } => offset,
            _ => 0,
        }
    }

    /// The `Range` to request, if any.
    pub fn range(&self) -> Option<ByteRange> {
        self.range_start.map(|start| ByteRange {
            start,
            end: self.range_end,
        })
    }
}

/// Decide how to bring a destination holding `existing` bytes up to date.
pub fn negotiate(existing: u64, remote_size: Option<u64>) -> TransferPlan {
    match (existing, remote_size) {
        (0, _) => TransferPlan::restart(),
        (existing, Some(size)) if existing == size => TransferPlan::skip(),
        (existing, Some(size)) if existing < size => TransferPlan::resume(existing, size),
        _ => TransferPlan::restart(),
    }
}
