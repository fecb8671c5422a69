//! repomirror - resumable mirroring of hub-hosted repositories
//!
//! This library enumerates the files of a model, dataset or space repository,
//! filters them by glob patterns and downloads them into a local mirror. Partial
//! files left by an interrupted run act as the resume checkpoint: the next run
//! reconciles them with the remote sizes and continues with byte-range requests.
//!
//! # Architecture
//!
//! ```text
//! RepoSync (sync)
//!     │
//!     ├── MetadataProvider / AddressResolver (repo, repo::hub)
//!     ├── PatternFilter (filter)
//!     ├── SyncStrategy: Sequential | Parallel (sync::strategy)
//!     │
//!     └── per file:
//!             resolve_size (transfer::probe)
//!             existing_bytes (transfer::local)
//!             negotiate -> TransferPlan (transfer::plan)
//!             RetrySupervisor (transfer::retry)
//!                 └── StreamingTransfer (transfer::stream) over Transport (transfer::http)
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod filter;
pub mod repo;
pub mod sync;
pub mod transfer;

pub use cancel::CancelFlag;
pub use config::{ConfigError, ConfigFile, SyncConfig};
pub use error::{SyncError, SyncResult, TransportError};
pub use filter::PatternFilter;
pub use repo::{AddressResolver, MetadataProvider, RemoteFile, RepoInfo, RepoRef, RepoType};
pub use sync::{format_size, FileReport, FileStatus, RepoSync, SyncReport, SyncRequest};
pub use transfer::progress::{AggregateProgress, NoProgress, ProgressSink};

/// Crate version, used in the HTTP user agent and the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
