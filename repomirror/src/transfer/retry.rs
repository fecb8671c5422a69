//! Bounded per-file retries.
//!
//! The supervisor is an explicit state machine:
//!
//! ```text
//!              success
//! Attempting ───────────────────────────────▶ Succeeded
//!    │  ▲
//!    │  │ budget left
//!    │  └──────────── RetryWithRestart ◀── 416 (discard local bytes)
//!    │  └──────────── RetryAsIs        ◀── other status / transport error
//!    │                      │
//!    │                      │ budget exhausted
//!    └──────────────────────┴───────────────▶ GaveUp
//! ```
//!
//! Every failed attempt consumes one unit of budget, a 416 included.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::plan::TransferPlan;
use super::stream::Outcome;
use crate::error::SyncResult;

/// Default number of attempts per file.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the delay between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Position of a file in its retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    Succeeded,
    RetryWithRestart,
    RetryAsIs,
    GaveUp,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::GaveUp)
    }
}

/// Attempts left for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    total: u32,
}

impl RetryBudget {
    /// A budget of `attempts`, at least one.
    pub fn new(attempts: u32) -> Self {
        let total = attempts.max(1);
        Self {
            remaining: total,
            total,
        }
    }

    /// Spend one attempt.
    pub fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Transition out of `Attempting` for the given outcome.
pub fn after_attempt(outcome: &Outcome, budget: &mut RetryBudget) -> RetryState {
    match outcome {
        Outcome::Success { .. } => RetryState::Succeeded,
        Outcome::RangeNotSatisfiable => {
            budget.consume();
            RetryState::RetryWithRestart
        }
        Outcome::HttpStatus(_) | Outcome::Transport(_) => {
            budget.consume();
            RetryState::RetryAsIs
        }
    }
}

/// Transition out of a retry state.
pub fn after_retry(budget: &RetryBudget) -> RetryState {
    if budget.is_exhausted() {
        RetryState::GaveUp
    } else {
        RetryState::Attempting
    }
}

/// One file's side of the retry loop.
pub trait Attempt {
    /// Run a single transfer attempt with `plan`.
    fn attempt(&mut self, plan: &TransferPlan) -> SyncResult<Outcome>;

    /// Discard local bytes and return a restart plan.
    fn restart(&mut self) -> SyncResult<TransferPlan>;

    /// Derive a fresh plan from the bytes currently on disk.
    fn replan(&mut self) -> SyncResult<TransferPlan>;
}

/// Final state of a supervised file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedOutcome {
    pub state: RetryState,
    pub attempts: u32,
    /// Description of the most recent failed attempt.
    pub last_failure: Option<String>,
}

impl SupervisedOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RetryState::Succeeded
    }
}

/// Drives an [`Attempt`] to `Succeeded` or `GaveUp`.
#[derive(Debug, Clone)]
pub struct RetrySupervisor {
    max_attempts: u32,
    retry_delay: Duration,
}

impl Default for RetrySupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl RetrySupervisor {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_delay
            .checked_mul(factor)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }

    /// Run the loop for `path` starting from `plan`.
    ///
    /// Errors from the attempt itself (local I/O, cancellation) end the loop
    /// immediately and are returned unchanged.
    pub fn run<A: Attempt>(
        &self,
        path: &str,
        plan: TransferPlan,
        job: &mut A,
    ) -> SyncResult<SupervisedOutcome> {
        let mut budget = RetryBudget::new(self.max_attempts);
        let mut state = RetryState::Attempting;
        let mut plan = plan;
        let mut attempts = 0;
        let mut last_failure = None;

        while !state.is_terminal() {
            state = match state {
                RetryState::Attempting => {
                    attempts += 1;
                    debug!(path, attempt = attempts, action = ?plan.action, "starting attempt");
                    let outcome = job.attempt(&plan)?;
                    if !outcome.is_success() {
                        last_failure = Some(outcome.describe());
                    }
                    after_attempt(&outcome, &mut budget)
                }
                RetryState::RetryWithRestart => {
                    plan = job.restart()?;
                    let next = after_retry(&budget);
                    if next == RetryState::Attempting {
                        warn!(
                            path,
                            attempt = attempts,
                            max = budget.total(),
                            "range not satisfiable, restarting from zero"
                        );
                        thread::sleep(self.backoff(attempts));
                    }
                    next
                }
                RetryState::RetryAsIs => {
                    let next = after_retry(&budget);
                    if next == RetryState::Attempting {
                        warn!(
                            path,
                            attempt = attempts,
                            max = budget.total(),
                            reason = last_failure.as_deref().unwrap_or("unknown"),
                            "attempt failed, retrying"
                        );
                        thread::sleep(self.backoff(attempts));
                        plan = job.replan()?;
                        if plan.is_skip() {
                            debug!(path, "file completed by the failed attempt");
                            RetryState::Succeeded
                        } else {
                            next
                        }
                    } else {
                        next
                    }
                }
                RetryState::Succeeded | RetryState::GaveUp => state,
            };
        }

        if state == RetryState::GaveUp {
            warn!(
                path,
                attempts,
                reason = last_failure.as_deref().unwrap_or("unknown"),
                "giving up"
            );
        }

        Ok(SupervisedOutcome {
            state,
            attempts,
            last_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::error::{SyncError, TransportError};

    /// Replays scripted outcomes and records every call.
    struct Scripted {
        outcomes: VecDeque<SyncResult<Outcome>>,
        plans: Vec<TransferPlan>,
        restarts: u32,
        replans: u32,
        replan_to: TransferPlan,
    }

    impl Scripted {
        fn new(outcomes: Vec<SyncResult<Outcome>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                plans: Vec::new(),
                restarts: 0,
                replans: 0,
                replan_to: TransferPlan::resume(10, 100),
            }
        }
    }

    impl Attempt for Scripted {
        fn attempt(&mut self, plan: &TransferPlan) -> SyncResult<Outcome> {
            self.plans.push(*plan);
            self.outcomes
                .pop_front()
                .unwrap_or(Ok(Outcome::Success { bytes_written: 0 }))
        }

        fn restart(&mut self) -> SyncResult<TransferPlan> {
            self.restarts += 1;
            Ok(TransferPlan::restart())
        }

        fn replan(&mut self) -> SyncResult<TransferPlan> {
            self.replans += 1;
            Ok(self.replan_to)
        }
    }

    fn supervisor(attempts: u32) -> RetrySupervisor {
        RetrySupervisor::new(attempts, Duration::ZERO)
    }

    fn timeout() -> SyncResult<Outcome> {
        Ok(Outcome::Transport(TransportError::Timeout("slow".to_string())))
    }

    #[test]
    fn test_first_attempt_success() {
        let mut job = Scripted::new(vec![Ok(Outcome::Success { bytes_written: 5 })]);
        let result = supervisor(3)
            .run("a", TransferPlan::restart(), &mut job)
            .unwrap();

        assert_eq!(result.state, RetryState::Succeeded);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.last_failure, None);
    }

    #[test]
    fn test_416_triggers_exactly_one_restart_cycle() {
        let mut job = Scripted::new(vec![
            Ok(Outcome::RangeNotSatisfiable),
            Ok(Outcome::Success { bytes_written: 100 }),
        ]);
        let resume = TransferPlan::resume(40, 100);
        let result = supervisor(3).run("a", resume, &mut job).unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempts, 2);
        assert_eq!(job.restarts, 1);
        assert_eq!(job.replans, 0);
        assert_eq!(job.plans, vec![resume, TransferPlan::restart()]);
    }

    #[test]
    fn test_416_with_single_attempt_gives_up_after_discarding() {
        let mut job = Scripted::new(vec![Ok(Outcome::RangeNotSatisfiable)]);
        let result = supervisor(1)
            .run("a", TransferPlan::resume(40, 100), &mut job)
            .unwrap();

        assert_eq!(result.state, RetryState::GaveUp);
        assert_eq!(job.restarts, 1);
    }

    #[test]
    fn test_transport_errors_exhaust_budget() {
        let mut job = Scripted::new(vec![timeout(), timeout(), timeout()]);
        let result = supervisor(3)
            .run("a", TransferPlan::restart(), &mut job)
            .unwrap();

        assert_eq!(result.state, RetryState::GaveUp);
        assert_eq!(result.attempts, 3);
        assert_eq!(job.restarts, 0);
        assert_eq!(job.replans, 2);
        assert_eq!(result.last_failure.as_deref(), Some("timed out: slow"));
    }

    #[test]
    fn test_retry_as_is_keeps_local_bytes() {
        let mut job = Scripted::new(vec![
            Ok(Outcome::HttpStatus(503)),
            Ok(Outcome::Success { bytes_written: 90 }),
        ]);
        let result = supervisor(3)
            .run("a", TransferPlan::restart(), &mut job)
            .unwrap();

        assert!(result.is_success());
        assert_eq!(job.restarts, 0);
        // The second attempt resumes from what the first one left on disk.
        assert_eq!(job.plans[1], TransferPlan::resume(10, 100));
    }

    #[test]
    fn test_replan_to_skip_succeeds_without_another_attempt() {
        let mut job = Scripted::new(vec![timeout()]);
        job.replan_to = TransferPlan::skip();
        let result = supervisor(3)
            .run("a", TransferPlan::restart(), &mut job)
            .unwrap();

        assert_eq!(result.state, RetryState::Succeeded);
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_fatal_error_stops_loop() {
        let mut job = Scripted::new(vec![Err(SyncError::Interrupted)]);
        let result = supervisor(3).run("a", TransferPlan::restart(), &mut job);
        assert!(matches!(result, Err(SyncError::Interrupted)));
    }

    #[test]
    fn test_transition_table() {
        let mut budget = RetryBudget::new(2);
        assert_eq!(
            after_attempt(&Outcome::Success { bytes_written: 1 }, &mut budget),
            RetryState::Succeeded
        );
        assert_eq!(budget.remaining(), 2);

        assert_eq!(
            after_attempt(&Outcome::RangeNotSatisfiable, &mut budget),
            RetryState::RetryWithRestart
        );
        assert_eq!(after_retry(&budget), RetryState::Attempting);

        assert_eq!(
            after_attempt(&Outcome::HttpStatus(500), &mut budget),
            RetryState::RetryAsIs
        );
        assert_eq!(after_retry(&budget), RetryState::GaveUp);
    }

    #[test]
    fn test_budget_has_at_least_one_attempt() {
        assert_eq!(RetryBudget::new(0).remaining(), 1);
        assert_eq!(RetrySupervisor::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let s = RetrySupervisor::new(5, Duration::from_millis(500));
        assert_eq!(s.backoff(1), Duration::from_millis(500));
        assert_eq!(s.backoff(2), Duration::from_secs(1));
        assert_eq!(s.backoff(3), Duration::from_secs(2));
        assert_eq!(s.backoff(40), MAX_RETRY_DELAY);
    }
}
