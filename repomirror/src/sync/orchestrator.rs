//! Per-run orchestration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::layout::{destination_for, destination_root};
use super::report::{FileReport, FileStatus, SyncReport};
use super::strategy::{ParallelStrategy, SequentialStrategy, SyncStrategy};
use super::{SyncOptions, SyncRequest};
use crate::cancel::CancelFlag;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::filter::PatternFilter;
use crate::repo::hub::HubClient;
use crate::repo::{AddressResolver, MetadataProvider, RemoteFile, RepoRef};
use crate::transfer::local::{discard, ensure_parent, existing_bytes};
use crate::transfer::{
    negotiate, resolve_size, AggregateProgress, Attempt, FileProgress, NoProgress, Outcome,
    ProgressSink, ReqwestTransport, RetrySupervisor, StreamingTransfer, TransferPlan, Transport,
};

/// Mirrors hub repositories into a local directory.
///
/// Collaborators are injected as trait objects so tests can run the whole
/// pipeline against in-memory doubles.
pub struct RepoSync {
    metadata: Arc<dyn MetadataProvider>,
    resolver: Arc<dyn AddressResolver>,
    transport: Arc<dyn Transport>,
    options: SyncOptions,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelFlag,
}

/// State shared by every file of one run.
struct RunContext<'a> {
    repo: &'a RepoRef,
    root: &'a Path,
    aggregate: &'a Arc<AggregateProgress>,
    transfer: &'a StreamingTransfer,
    supervisor: &'a RetrySupervisor,
}

impl RepoSync {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        resolver: Arc<dyn AddressResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            metadata,
            resolver,
            transport,
            options: SyncOptions::default(),
            sink: Arc::new(NoProgress),
            cancel: CancelFlag::new(),
        }
    }

    /// Build a sync against the configured hub with real HTTP clients.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let hub = Arc::new(HubClient::new(
            &config.endpoint,
            config.token.clone(),
            config.timeout,
        )?);
        let transport = Arc::new(ReqwestTransport::new(config.timeout, config.token.clone())?);

        Ok(Self::new(hub.clone(), hub, transport).with_options(SyncOptions::from(config)))
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// The flag that stops this sync; clone it into a signal handler.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Mirror `request.repo` below `request.local_dir`.
    ///
    /// Fails only for fatal conditions: unknown repository, rejected
    /// credentials, unusable local directory. Files that exhaust their
    /// retries are recorded in the report and the run continues. A cancelled
    /// run returns a report with `cancelled` set.
    pub fn sync(&self, request: &SyncRequest) -> SyncResult<SyncReport> {
        let repo = &request.repo;
        self.cancel.check()?;

        let filter = PatternFilter::new(&request.allow, &request.ignore)?;
        if !filter.is_unrestricted() {
            debug!(allow = ?request.allow, ignore = ?request.ignore, "path filter active");
        }

        let repo_info = self.metadata.repo_info(repo)?;
        info!(repo = %repo, commit = ?repo_info.sha, "repository found");

        let listed = self.metadata.list_files(repo)?;
        let selected: Vec<RemoteFile> = listed
            .iter()
            .filter(|f| filter.include(&f.path))
            .cloned()
            .collect();
        info!(
            listed = listed.len(),
            selected = selected.len(),
            "filtered repository listing"
        );

        let root = destination_root(&request.local_dir, repo);
        fs::create_dir_all(&root).map_err(|source| SyncError::CreateDir {
            path: root.clone(),
            source,
        })?;

        let known_total: u64 = selected.iter().filter_map(|f| f.size).sum();
        let aggregate = Arc::new(AggregateProgress::new(
            Some(known_total),
            Arc::clone(&self.sink),
        ));

        let transfer = StreamingTransfer::new(
            Arc::clone(&self.transport),
            self.options.chunk_size,
            self.cancel.clone(),
        );
        let supervisor = RetrySupervisor::new(self.options.max_attempts, self.options.retry_delay);
        let ctx = RunContext {
            repo,
            root: &root,
            aggregate: &aggregate,
            transfer: &transfer,
            supervisor: &supervisor,
        };

        let strategy: Box<dyn SyncStrategy> = if self.options.parallel <= 1 {
            Box::new(SequentialStrategy::new())
        } else {
            Box::new(ParallelStrategy::new(self.options.parallel))
        };

        let worker = |file: &RemoteFile| self.process_file(&ctx, file);
        let outcome = strategy.execute(&selected, &worker)?;

        if outcome.interrupted {
            warn!(
                processed = outcome.reports.len(),
                selected = selected.len(),
                "sync interrupted"
            );
        }

        Ok(SyncReport {
            repo: repo.clone(),
            destination: root,
            commit: repo_info.sha,
            files: outcome.reports,
            selected: selected.len(),
            completed_bytes: aggregate.completed(),
            total_bytes: aggregate.total(),
            received_bytes: aggregate.transferred(),
            cancelled: outcome.interrupted,
        })
    }

    /// Bring one file up to date.
    fn process_file(&self, ctx: &RunContext<'_>, file: &RemoteFile) -> SyncResult<FileReport> {
        self.cancel.check()?;

        let dest = match destination_for(ctx.root, &file.path) {
            Ok(dest) => dest,
            Err(e) => {
                warn!(path = %file.path, "{}", e);
                let status = FileStatus::Failed {
                    reason: e.to_string(),
                    attempts: 0,
                };
                self.sink.file_finished(&file.path, &status);
                return Ok(FileReport {
                    path: file.path.clone(),
                    destination: ctx.root.to_path_buf(),
                    size: file.size,
                    status,
                });
            }
        };

        let url = self.resolver.resolve(ctx.repo, &file.path)?;
        let size = resolve_size(self.transport.as_ref(), &url, file);
        if file.size.is_none() {
            if let Some(resolved) = size {
                debug!(path = %file.path, size = resolved, "resolved unknown size");
                ctx.aggregate.grow_total(resolved);
            }
        }

        ensure_parent(&dest)?;
        let existing = existing_bytes(&dest)?;
        let plan = negotiate(existing, size);
        let mut progress = FileProgress::new(file.path.clone(), Arc::clone(ctx.aggregate));

        let status = if plan.is_skip() {
            debug!(path = %file.path, bytes = existing, "already complete");
            progress.skip(existing);
            FileStatus::Skipped { bytes: existing }
        } else {
            if existing > 0 {
                debug!(path = %file.path, existing, action = ?plan.action, "found partial file");
            }
            let mut job = FileJob {
                transfer: ctx.transfer,
                url: &url,
                dest: &dest,
                size,
                progress: &mut progress,
            };
            let outcome = ctx.supervisor.run(&file.path, plan, &mut job)?;

            if outcome.is_success() {
                FileStatus::Downloaded {
                    bytes: existing_bytes(&dest)?,
                    attempts: outcome.attempts,
                }
            } else {
                FileStatus::Failed {
                    reason: outcome
                        .last_failure
                        .unwrap_or_else(|| "unknown failure".to_string()),
                    attempts: outcome.attempts,
                }
            }
        };

        ctx.aggregate.settle(size, progress.credited());
        self.sink.file_finished(&file.path, &status);

        Ok(FileReport {
            path: file.path.clone(),
            destination: dest,
            size,
            status,
        })
    }
}

impl std::fmt::Debug for RepoSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoSync")
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// One file's attempts, as driven by the retry supervisor.
struct FileJob<'a> {
    transfer: &'a StreamingTransfer,
    url: &'a str,
    dest: &'a PathBuf,
    size: Option<u64>,
    progress: &'a mut FileProgress,
}

impl Attempt for FileJob<'_> {
    fn attempt(&mut self, plan: &TransferPlan) -> SyncResult<Outcome> {
        self.transfer
            .attempt(self.url, plan, self.dest, self.size, self.progress)
    }

    fn restart(&mut self) -> SyncResult<TransferPlan> {
        discard(self.dest)?;
        Ok(TransferPlan::restart())
    }

    fn replan(&mut self) -> SyncResult<TransferPlan> {
        Ok(negotiate(existing_bytes(self.dest)?, self.size))
    }
}
