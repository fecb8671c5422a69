//! External cancellation of a sync run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};

/// Shared flag that stops a run at the next chunk boundary.
///
/// Clones share the same flag, so one copy can live in a signal handler while
/// the transfer loop polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return [`SyncError::Interrupted`] once cancellation was requested.
    pub fn check(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let handler_copy = flag.clone();

        assert!(flag.check().is_ok());
        handler_copy.cancel();

        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(SyncError::Interrupted)));
    }
}
