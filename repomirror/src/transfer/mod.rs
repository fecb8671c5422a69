//! Resumable single-file transfer engine.
//!
//! This module reconciles a local partial file with remote metadata and moves
//! the missing bytes:
//! - Local length inspection (`local`)
//! - Metadata-only size probing (`probe`)
//! - Skip / resume / restart negotiation (`plan`)
//! - HTTP transport seam (`http`)
//! - One streamed attempt (`stream`)
//! - Bounded retries with the 416 restart rule (`retry`)
//! - Per-file and run-wide byte accounting (`progress`)
//!
//! # Architecture
//!
//! ```text
//! RetrySupervisor
//!     │
//!     ├── Attempt (trait) ── implemented per file by the orchestrator
//!     │       │
//!     │       └── StreamingTransfer ── Transport (trait)
//!     │                                   ├── ReqwestTransport
//!     │                                   └── test doubles
//!     │
//!     └── negotiate(existing_bytes, remote_size) -> TransferPlan
//! ```

pub mod http;
pub mod local;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod stream;

pub use http::{ByteRange, FetchResponse, ProbeResponse, ReqwestTransport, Transport};
pub use plan::{negotiate, TransferAction, TransferPlan};
pub use probe::resolve_size;
pub use progress::{AggregateProgress, FileProgress, NoProgress, ProgressSink};
pub use retry::{Attempt, RetryBudget, RetryState, RetrySupervisor, SupervisedOutcome};
pub use stream::{Outcome, StreamingTransfer};
