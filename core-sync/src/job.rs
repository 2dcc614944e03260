//! # Sync Job State Machine
//!
//! Tracks one sync run from start to its terminal status.
//!
//! ## State Machine
//!
//! ```text
//! Running → Completed
//!    ├────→ Failed
//!    └────→ Cancelled
//! ```
//!
//! A job is created `Running`. Terminal states cannot transition. While running
//! the job tallies the run summary and a [`SyncProgress`] snapshot; the
//! persisted form is [`SyncRun`].

use crate::{Result, SyncError};
use core_library::{now_timestamp, SyncRun, SyncRunId, SyncRunStatus};
use core_runtime::events::{SyncFileError, SyncSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Progress Types
// ============================================================================

/// Coarse phase of a running sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Scanning,
    Reconciling,
    Removing,
    Finished,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Scanning => "scanning",
            SyncPhase::Reconciling => "reconciling",
            SyncPhase::Removing => "removing",
            SyncPhase::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Progress information for a running sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub run_id: SyncRunId,
    /// Total number of audio files discovered
    pub items_discovered: u64,
    /// Number of files processed so far
    pub items_processed: u64,
    /// Number of files that failed processing
    pub items_failed: u64,
    /// Progress percentage (0-100)
    pub percent: u8,
    pub phase: SyncPhase,
}

impl SyncProgress {
    pub fn new(run_id: SyncRunId) -> Self {
        Self {
            run_id,
            items_discovered: 0,
            items_processed: 0,
            items_failed: 0,
            percent: 0,
            phase: SyncPhase::Scanning,
        }
    }

    /// Update progress with new values
    pub fn update(&mut self, items_processed: u64, items_discovered: u64, phase: SyncPhase) {
        self.items_processed = items_processed;
        self.items_discovered = items_discovered;
        self.phase = phase;

        // Calculate percentage (cap at 100)
        self.percent = if items_discovered > 0 {
            ((items_processed as f64 / items_discovered as f64) * 100.0).min(100.0) as u8
        } else {
            0
        };
    }
}

// ============================================================================
// Sync Job Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncRunId,
    /// Root folder being synced
    pub folder: PathBuf,
    pub status: SyncRunStatus,
    pub progress: SyncProgress,
    /// Running tally, final once the job is terminal
    pub summary: SyncSummary,
    /// Error message if failed
    pub error_message: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl SyncJob {
    /// Start a job for `folder`.
    pub fn start(id: SyncRunId, folder: impl Into<PathBuf>) -> Self {
        Self {
            id,
            folder: folder.into(),
            status: SyncRunStatus::Running,
            progress: SyncProgress::new(id),
            summary: SyncSummary::default(),
            error_message: None,
            started_at: now_timestamp(),
            completed_at: None,
        }
    }

    pub fn run_id(&self) -> String {
        self.id.to_string()
    }

    /// Update progress information
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn update_progress(
        &mut self,
        items_processed: u64,
        items_discovered: u64,
        phase: SyncPhase,
    ) -> Result<()> {
        self.ensure_running("update_progress")?;
        self.progress
            .update(items_processed, items_discovered, phase);
        Ok(())
    }

    pub fn record_added(&mut self) {
        self.summary.added += 1;
    }

    pub fn record_updated(&mut self) {
        self.summary.updated += 1;
    }

    pub fn record_removed(&mut self) {
        self.summary.removed += 1;
    }

    pub fn record_error(&mut self, path: &Path, message: impl Into<String>) {
        self.progress.items_failed += 1;
        self.summary.errors.push(SyncFileError {
            path: path.to_path_buf(),
            message: message.into(),
        });
    }

    /// Mark the job as completed
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn complete(&mut self) -> Result<()> {
        self.validate_transition(SyncRunStatus::Completed)?;
        self.finish(SyncRunStatus::Completed);
        self.progress.percent = 100;
        Ok(())
    }

    /// Mark the job as failed with an error message
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.validate_transition(SyncRunStatus::Failed)?;
        self.finish(SyncRunStatus::Failed);
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// Cancel the job
    ///
    /// # Errors
    ///
    /// Returns an error if the job is already in a terminal state
    pub fn cancel(&mut self) -> Result<()> {
        self.validate_transition(SyncRunStatus::Cancelled)?;
        self.finish(SyncRunStatus::Cancelled);
        Ok(())
    }

    /// Duration in seconds, once the job has finished
    pub fn duration_secs(&self) -> Option<u64> {
        self.completed_at
            .map(|end| end.saturating_sub(self.started_at).max(0) as u64)
    }

    /// Persisted form of this job.
    pub fn to_sync_run(&self) -> SyncRun {
        SyncRun {
            id: self.id,
            folder: self.folder.clone(),
            started_at: self.started_at,
            finished_at: self.completed_at,
            status: self.status,
            added: self.summary.added,
            updated: self.summary.updated,
            removed: self.summary.removed,
            error_count: self.summary.error_count(),
            error_message: self.error_message.clone(),
        }
    }

    fn finish(&mut self, status: SyncRunStatus) {
        self.status = status;
        self.completed_at = Some(now_timestamp());
        self.progress.phase = SyncPhase::Finished;
    }

    fn ensure_running(&self, operation: &str) -> Result<()> {
        if self.status != SyncRunStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: operation.to_string(),
                reason: "Job must be running".to_string(),
            });
        }
        Ok(())
    }

    /// Validate a state transition
    fn validate_transition(&self, to: SyncRunStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncRunStatus::Running, SyncRunStatus::Completed)
                | (SyncRunStatus::Running, SyncRunStatus::Failed)
                | (SyncRunStatus::Running, SyncRunStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
