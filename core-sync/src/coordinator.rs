//! # Sync Coordinator
//!
//! Runs folder syncs one at a time.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns the single-run slot. [`SyncCoordinator::start_sync`]
//! claims the slot (or reports the run already holding it), spawns the run on
//! the runtime captured at construction and returns a [`RunHandle`].
//!
//! ## Workflow
//!
//! 1. Resolve the folder and record the run as `running`
//! 2. Walk the folder (fatal if the root is unusable)
//! 3. Emit `Started`, then reconcile file by file
//! 4. Persist the terminal run, emit exactly one terminal event
//! 5. Release the slot
//!
//! The slot is released only after the terminal event was delivered, so
//! `is_syncing()` turning false implies the listener has seen everything.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ChannelListener, SyncCoordinator, SyncConfig};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     coordinator: Arc<SyncCoordinator>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let (listener, mut events) = ChannelListener::new();
//! let handle = coordinator.start_sync("/music".as_ref(), Arc::new(listener))?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//!
//! let report = handle.wait().await?;
//! println!("Added {} tracks", report.summary.added);
//! # Ok(())
//! # }
//! ```

use crate::job::{SyncJob, SyncProgress};
use crate::listener::{ProgressCell, ProgressEmitter, SyncListener};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::scanner::FolderScanner;
use crate::{Result, SyncError};
use core_library::{CatalogStore, SyncRun, SyncRunId, SyncRunStatus};
use core_metadata::MetadataExtractor;
use core_runtime::config::{CoreConfig, ScanConfig};
use core_runtime::events::{EventBus, SyncEvent, SyncSummary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Sync coordinator configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Which files count as audio and how the tree is walked
    pub scan: ScanConfig,
}

impl From<&CoreConfig> for SyncConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            scan: config.scan.clone(),
        }
    }
}

/// Outcome of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: SyncRunId,
    pub folder: PathBuf,
    pub status: SyncRunStatus,
    pub summary: SyncSummary,
    /// Set when the run failed
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn is_completed(&self) -> bool {
        self.status == SyncRunStatus::Completed
    }

    fn terminal_event(&self) -> SyncEvent {
        let run_id = self.run_id.to_string();
        let summary = self.summary.clone();
        match self.status {
            SyncRunStatus::Cancelled => SyncEvent::Cancelled { run_id, summary },
            SyncRunStatus::Failed | SyncRunStatus::Running => SyncEvent::Failed {
                run_id,
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "sync did not finish".to_string()),
                summary,
            },
            SyncRunStatus::Completed => SyncEvent::Completed {
                run_id,
                summary,
                duration_ms: self.duration_ms,
            },
        }
    }
}

/// Handle to a started run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: SyncRunId,
    cancellation_token: CancellationToken,
    join: JoinHandle<SyncReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> SyncRunId {
        self.run_id
    }

    /// Request cooperative cancellation; returns immediately.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end. Resolves after its terminal event was delivered.
    pub async fn wait(self) -> Result<SyncReport> {
        self.join
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))
    }
}

/// Active sync tracking
struct ActiveSync {
    run_id: SyncRunId,
    folder: PathBuf,
    cancellation_token: CancellationToken,
    progress: ProgressCell,
}

type ActiveSlot = Arc<Mutex<Option<ActiveSync>>>;

fn lock_slot(slot: &Mutex<Option<ActiveSync>>) -> MutexGuard<'_, Option<ActiveSync>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Frees the slot when the run task ends, however it ends.
struct ActiveGuard {
    slot: ActiveSlot,
    run_id: SyncRunId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.as_ref().map(|a| a.run_id) == Some(self.run_id) {
            *slot = None;
        }
    }
}

/// Sync coordinator for orchestrating folder synchronization
pub struct SyncCoordinator {
    config: SyncConfig,
    store: Arc<dyn CatalogStore>,
    extractor: Arc<dyn MetadataExtractor>,
    /// Every run event is mirrored here when set
    event_bus: Option<EventBus>,
    runtime: Handle,
    active: ActiveSlot,
}

impl SyncCoordinator {
    /// Create a coordinator bound to the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoRuntime`] when called outside a runtime.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn CatalogStore>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| SyncError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(config, store, extractor, runtime))
    }

    /// Create a coordinator that spawns runs on `runtime`.
    pub fn with_runtime(
        config: SyncConfig,
        store: Arc<dyn CatalogStore>,
        extractor: Arc<dyn MetadataExtractor>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            store,
            extractor,
            event_bus: None,
            runtime,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Start syncing `folder` into the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] naming the run in flight; that run
    /// is not affected.
    #[instrument(skip(self, listener), fields(folder = %folder.display()))]
    pub fn start_sync(
        &self,
        folder: &Path,
        listener: Arc<dyn SyncListener>,
    ) -> Result<RunHandle> {
        let run_id = SyncRunId::new();
        let cancellation_token = CancellationToken::new();
        let progress: ProgressCell = Arc::new(Mutex::new(SyncProgress::new(run_id)));

        {
            let mut slot = lock_slot(&self.active);
            if let Some(active) = slot.as_ref() {
                debug!(active = %active.run_id, "Rejecting sync start");
                return Err(SyncError::AlreadyRunning {
                    run_id: active.run_id.to_string(),
                });
            }
            *slot = Some(ActiveSync {
                run_id,
                folder: folder.to_path_buf(),
                cancellation_token: cancellation_token.clone(),
                progress: Arc::clone(&progress),
            });
        }

        let task = SyncTask {
            run_id,
            folder: folder.to_path_buf(),
            scan: self.config.scan.clone(),
            store: Arc::clone(&self.store),
            reconciler: Reconciler::new(Arc::clone(&self.store), Arc::clone(&self.extractor)),
            emitter: ProgressEmitter::new(listener, self.event_bus.clone(), progress),
            cancel: cancellation_token.clone(),
            _guard: ActiveGuard {
                slot: Arc::clone(&self.active),
                run_id,
            },
        };
        let join = self.runtime.spawn(task.run());

        info!(run_id = %run_id, "Started sync of {}", folder.display());

        Ok(RunHandle {
            run_id,
            cancellation_token,
            join,
        })
    }

    /// Request cancellation of the active run without waiting for it.
    ///
    /// Returns `false` when no run is active.
    pub fn cancel_sync(&self) -> bool {
        let slot = lock_slot(&self.active);
        match slot.as_ref() {
            Some(active) => {
                active.cancellation_token.cancel();
                info!(
                    run_id = %active.run_id,
                    folder = %active.folder.display(),
                    "Cancellation requested"
                );
                true
            }
            None => false,
        }
    }

    pub fn is_syncing(&self) -> bool {
        lock_slot(&self.active).is_some()
    }

    pub fn active_run(&self) -> Option<SyncRunId> {
        lock_slot(&self.active).as_ref().map(|a| a.run_id)
    }

    /// Live progress of the active run.
    pub fn status(&self) -> Option<SyncProgress> {
        lock_slot(&self.active).as_ref().map(|active| {
            active
                .progress
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        })
    }

    /// Most recent persisted runs, newest first.
    pub async fn history(&self, limit: u32) -> Result<Vec<SyncRun>> {
        Ok(self.store.recent_sync_runs(limit).await?)
    }
}

/// Everything one spawned run needs.
struct SyncTask {
    run_id: SyncRunId,
    folder: PathBuf,
    scan: ScanConfig,
    store: Arc<dyn CatalogStore>,
    reconciler: Reconciler,
    emitter: ProgressEmitter,
    cancel: CancellationToken,
    // Dropped last, after the terminal event.
    _guard: ActiveGuard,
}

impl SyncTask {
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    async fn run(self) -> SyncReport {
        let started = Instant::now();
        let mut job = SyncJob::start(self.run_id, &self.folder);

        let outcome = self.execute(&mut job).await;
        let transition = match outcome {
            Ok(ReconcileOutcome::Completed) => job.complete(),
            Ok(ReconcileOutcome::Cancelled) => job.cancel(),
            Err(e) => {
                error!("Sync {} failed: {}", self.run_id, e);
                job.fail(e.to_string())
            }
        };
        if let Err(e) = transition {
            error!("Sync {} ended in an unexpected state: {}", self.run_id, e);
        }
        self.emitter.publish_progress(&job.progress);

        if let Err(e) = self.store.record_sync_run(&job.to_sync_run()).await {
            warn!("Failed to persist sync run {}: {}", self.run_id, e);
        }

        let report = SyncReport {
            run_id: self.run_id,
            folder: job.folder.clone(),
            status: job.status,
            summary: job.summary.clone(),
            error: job.error_message.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.emitter.emit(report.terminal_event());

        info!(
            status = %report.status,
            added = report.summary.added,
            updated = report.summary.updated,
            removed = report.summary.removed,
            errors = report.summary.error_count(),
            "Sync finished"
        );
        report
    }

    async fn execute(&self, job: &mut SyncJob) -> Result<ReconcileOutcome> {
        let root = tokio::fs::canonicalize(&self.folder)
            .await
            .map_err(|e| SyncError::FatalScan {
                path: self.folder.clone(),
                message: e.to_string(),
            })?;
        job.folder = root.clone();

        self.store.record_sync_run(&job.to_sync_run()).await?;

        let scan_root = root.clone();
        let scan_config = self.scan.clone();
        let scan = tokio::task::spawn_blocking(move || {
            FolderScanner::new(scan_root, scan_config).map(|scanner| scanner.scan())
        })
        .await
        .map_err(|e| SyncError::TaskFailed(e.to_string()))??;

        self.emitter.emit(SyncEvent::Started {
            run_id: job.run_id(),
            folder: root.clone(),
            total_files: scan.files.len() as u64,
        });

        self.reconciler
            .reconcile(&root, scan, job, &self.cancel, &self.emitter)
            .await
    }
}
