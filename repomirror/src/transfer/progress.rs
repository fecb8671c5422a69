//! Byte accounting for a sync run.
//!
//! [`AggregateProgress`] is the single run-scoped counter shared by every
//! transfer. [`FileProgress`] sits between one file's attempts and the
//! aggregate, crediting each byte position at most once so that a restart
//! never counts the same bytes twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::sync::FileStatus;

/// Consumer of progress events, typically a progress bar renderer.
///
/// All methods default to no-ops so implementations override only what they
/// display. Called from worker threads when the run is parallel.
pub trait ProgressSink: Send + Sync {
    /// A transfer attempt for `path` begins at `offset` of `size` bytes.
    fn file_started(&self, _path: &str, _size: Option<u64>, _offset: u64) {}

    /// `delta` new bytes of `path` were written to disk.
    fn file_advanced(&self, _path: &str, _delta: u64) {}

    /// `path` reached its final status for this run.
    fn file_finished(&self, _path: &str, _status: &FileStatus) {}

    /// The run-wide completed counter grew by `delta`.
    fn aggregate_advanced(&self, _delta: u64) {}

    /// The run-wide total is now `total`.
    fn aggregate_total(&self, _total: u64) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Run-scoped progress: a monotonic completed counter and a total that only grows.
pub struct AggregateProgress {
    completed: AtomicU64,
    /// Bytes actually received over the network, excluding skipped and resumed prefixes.
    transferred: AtomicU64,
    total: Mutex<Option<u64>>,
    sink: Arc<dyn ProgressSink>,
}

impl AggregateProgress {
    /// Create the counter with the sum of sizes known at listing time.
    pub fn new(initial_total: Option<u64>, sink: Arc<dyn ProgressSink>) -> Self {
        if let Some(total) = initial_total {
            sink.aggregate_total(total);
        }
        Self {
            completed: AtomicU64::new(0),
            transferred: AtomicU64::new(0),
            total: Mutex::new(initial_total),
            sink,
        }
    }

    /// Add `delta` bytes to the completed counter.
    pub fn credit(&self, delta: u64) {
        if delta == 0 {
            return;
        }
        self.completed.fetch_add(delta, Ordering::SeqCst);
        self.sink.aggregate_advanced(delta);
    }

    /// Record `n` bytes received from the network.
    pub fn record_received(&self, n: u64) {
        self.transferred.fetch_add(n, Ordering::SeqCst);
    }

    /// Fold a newly discovered size into the total.
    ///
    /// The sink is notified under the lock, so it observes totals in
    /// increasing order even with several workers.
    pub fn grow_total(&self, delta: u64) {
        let mut guard = self.total.lock();
        let next = guard.unwrap_or(0).saturating_add(delta);
        *guard = Some(next);
        self.sink.aggregate_total(next);
    }

    /// Reconcile the total with a finished file.
    ///
    /// `expected` is the size already counted in the total for this file
    /// (`None` when it never became known) and `credited` is what the file
    /// added to the completed counter. Any surplus is folded into the total so
    /// the total never trails the completed counter.
    pub fn settle(&self, expected: Option<u64>, credited: u64) {
        let surplus = credited.saturating_sub(expected.unwrap_or(0));
        if surplus > 0 {
            self.grow_total(surplus);
        }
    }

    /// Bytes completed so far, including skipped files and resumed prefixes.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Bytes received over the network so far.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    /// Current total, if any size is known.
    pub fn total(&self) -> Option<u64> {
        *self.total.lock()
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }
}

impl std::fmt::Debug for AggregateProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateProgress")
            .field("completed", &self.completed())
            .field("transferred", &self.transferred())
            .field("total", &self.total())
            .finish()
    }
}

/// Progress of one file across all of its attempts.
#[derive(Debug)]
pub struct FileProgress {
    path: String,
    aggregate: Arc<AggregateProgress>,
    /// Highest byte position ever credited to the aggregate.
    credited: u64,
    /// Current length of the destination as written by this attempt.
    position: u64,
}

impl FileProgress {
    pub fn new(path: impl Into<String>, aggregate: Arc<AggregateProgress>) -> Self {
        Self {
            path: path.into(),
            aggregate,
            credited: 0,
            position: 0,
        }
    }

    /// Start an attempt whose first written byte is at `offset`.
    ///
    /// The bytes before `offset` are already on disk and count as completed.
    pub fn begin(&mut self, offset: u64, size: Option<u64>) {
        self.position = offset;
        self.credit_up_to(offset);
        self.aggregate.sink().file_started(&self.path, size, offset);
    }

    /// `n` bytes were appended to the destination.
    pub fn advance(&mut self, n: u64) {
        self.position += n;
        self.aggregate.record_received(n);
        self.credit_up_to(self.position);
        self.aggregate.sink().file_advanced(&self.path, n);
    }

    /// The file is already complete at `size` bytes.
    pub fn skip(&mut self, size: u64) {
        self.position = size;
        self.credit_up_to(size);
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes this file has contributed to the completed counter.
    pub fn credited(&self) -> u64 {
        self.credited
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn credit_up_to(&mut self, position: u64) {
        if position > self.credited {
            self.aggregate.credit(position - self.credited);
            self.credited = position;
        }
    }
}
