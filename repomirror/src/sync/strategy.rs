//! File scheduling strategies.
//!
//! Sequential processing is the default. The parallel strategy runs a bounded
//! pool of scoped threads over the file list; each file is still handled by a
//! single worker from start to finish.

use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::debug;

use super::report::FileReport;
use crate::error::{SyncError, SyncResult};
use crate::repo::RemoteFile;

/// Processes one file to its final report.
pub type FileWorker<'a> = dyn Fn(&RemoteFile) -> SyncResult<FileReport> + Sync + 'a;

/// Reports gathered by a strategy.
#[derive(Debug, Default)]
pub struct StrategyOutcome {
    /// Reports in listing order.
    pub reports: Vec<FileReport>,
    /// Processing stopped because of cancellation.
    pub interrupted: bool,
}

/// Schedules the per-file worker over the selected files.
pub trait SyncStrategy: Send + Sync {
    /// Run `worker` over `files`.
    ///
    /// Cancellation ends the run with `interrupted` set. Any other error from
    /// the worker is fatal and returned after in-flight files finish.
    fn execute(&self, files: &[RemoteFile], worker: &FileWorker<'_>) -> SyncResult<StrategyOutcome>;
}

/// One file at a time, in listing order.
#[derive(Debug, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SyncStrategy for SequentialStrategy {
    fn execute(&self, files: &[RemoteFile], worker: &FileWorker<'_>) -> SyncResult<StrategyOutcome> {
        let mut outcome = StrategyOutcome::default();

        for file in files {
            match worker(file) {
                Ok(report) => outcome.reports.push(report),
                Err(SyncError::Interrupted) => {
                    outcome.interrupted = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }
}

/// A bounded pool of workers pulling files from a shared index.
#[derive(Debug)]
pub struct ParallelStrategy {
    /// Maximum number of files in flight.
    pub concurrency: usize,
}

impl ParallelStrategy {
    /// Create a pool of `concurrency` workers (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SyncStrategy for ParallelStrategy {
    fn execute(&self, files: &[RemoteFile], worker: &FileWorker<'_>) -> SyncResult<StrategyOutcome> {
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let interrupted = AtomicBool::new(false);
        let fatal: Mutex<Option<SyncError>> = Mutex::new(None);
        let workers = self.concurrency.min(files.len());

        debug!(workers, files = files.len(), "starting worker pool");

        let (next, stop, interrupted_ref, fatal_ref) = (&next, &stop, &interrupted, &fatal);
        let mut indexed: Vec<(usize, FileReport)> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(move || {
                    let mut done = Vec::new();
                    while !stop.load(Ordering::SeqCst) {
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        let Some(file) = files.get(i) else {
                            break;
                        };

                        match worker(file) {
                            Ok(report) => done.push((i, report)),
                            Err(e) => {
                                stop.store(true, Ordering::SeqCst);
                                if e.is_interrupted() {
                                    interrupted_ref.store(true, Ordering::SeqCst);
                                } else {
                                    let mut slot = fatal_ref.lock();
                                    if slot.is_none() {
                                        *slot = Some(e);
                                    }
                                }
                            }
                        }
                    }
                    done
                }));
            }

            let mut indexed = Vec::with_capacity(files.len());
            for handle in handles {
                match handle.join() {
                    Ok(done) => indexed.extend(done),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            indexed
        });

        if let Some(e) = fatal.into_inner() {
            return Err(e);
        }

        indexed.sort_by_key(|(i, _)| *i);
        Ok(StrategyOutcome {
            reports: indexed.into_iter().map(|(_, report)| report).collect(),
            interrupted: interrupted.into_inner(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::sync::report::FileStatus;

    fn files(n: usize) -> Vec<RemoteFile> {
        (0..n)
            .map(|i| RemoteFile::new(format!("f{}", i), Some(i as u64)))
            .collect()
    }

    fn ok_report(file: &RemoteFile) -> SyncResult<FileReport> {
        Ok(FileReport {
            path: file.path.clone(),
            destination: PathBuf::from(&file.path),
            size: file.size,
            status: FileStatus::Skipped {
                bytes: file.size.unwrap_or(0),
            },
        })
    }

    fn paths(outcome: &StrategyOutcome) -> Vec<&str> {
        outcome.reports.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_sequential_keeps_order() {
        let outcome = SequentialStrategy::new()
            .execute(&files(3), &ok_report)
            .unwrap();
        assert_eq!(paths(&outcome), vec!["f0", "f1", "f2"]);
        assert!(!outcome.interrupted);
    }

    #[test]
    fn test_sequential_stops_on_interrupt() {
        let worker = |file: &RemoteFile| {
            if file.path == "f1" {
                Err(SyncError::Interrupted)
            } else {
                ok_report(file)
            }
        };
        let outcome = SequentialStrategy::new().execute(&files(3), &worker).unwrap();
        assert_eq!(paths(&outcome), vec!["f0"]);
        assert!(outcome.interrupted);
    }

    #[test]
    fn test_sequential_propagates_fatal_error() {
        let worker = |_: &RemoteFile| -> SyncResult<FileReport> {
            Err(SyncError::Client("boom".to_string()))
        };
        assert!(SequentialStrategy::new().execute(&files(2), &worker).is_err());
    }

    #[test]
    fn test_parallel_reports_in_listing_order() {
        let worker = |file: &RemoteFile| {
            // Later files finish first.
            let delay = 20 - file.size.unwrap_or(0).min(20);
            std::thread::sleep(Duration::from_millis(delay));
            ok_report(file)
        };
        let outcome = ParallelStrategy::new(4).execute(&files(8), &worker).unwrap();
        assert_eq!(
            paths(&outcome),
            vec!["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7"]
        );
    }

    #[test]
    fn test_parallel_interrupt_and_fatal() {
        let interrupt = |_: &RemoteFile| -> SyncResult<FileReport> { Err(SyncError::Interrupted) };
        let outcome = ParallelStrategy::new(2).execute(&files(5), &interrupt).unwrap();
        assert!(outcome.interrupted);
        assert!(outcome.reports.is_empty());

        let fatal = |_: &RemoteFile| -> SyncResult<FileReport> {
            Err(SyncError::Client("boom".to_string()))
        };
        assert!(ParallelStrategy::new(2).execute(&files(5), &fatal).is_err());
    }

    #[test]
    fn test_parallel_empty_and_min_concurrency() {
        assert_eq!(ParallelStrategy::new(0).concurrency, 1);
        let outcome = ParallelStrategy::default().execute(&[], &ok_report).unwrap();
        assert!(outcome.reports.is_empty());
    }
}
