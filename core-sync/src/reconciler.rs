//! # Sync Reconciler
//!
//! Brings the catalog in line with one scan of a folder.
//!
//! ## Workflow
//!
//! 1. Index the catalogued tracks under the root by path
//! 2. For every scanned file: fingerprint it, then insert (new path), update
//!    (fingerprint changed) or skip (unchanged). The path is taken out of the
//!    index in every case, failures included
//! 3. Delete whatever is left in the index
//!
//! Per-file metadata and IO failures are reported and skipped, as are file
//! names the catalog cannot store (not valid UTF-8). Other catalog store
//! failures abort the run. Cancellation is observed between files; a cancelled
//! run never reaches the removal phase, so unvisited tracks survive.

use crate::error::{Result, SyncError};
use crate::job::{SyncJob, SyncPhase};
use crate::listener::ProgressEmitter;
use crate::scanner::ScanResult;
use core_library::{CatalogStore, NewTrack, Track, TrackId};
use core_metadata::{fingerprint_file, MetadataExtractor};
use core_runtime::events::SyncEvent;
use core_runtime::logging::file_name_of;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How a reconciliation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileOutcome {
    Completed,
    Cancelled,
}

/// Result of processing one scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileChange {
    Added(TrackId),
    Updated(TrackId),
    Unchanged,
}

pub(crate) struct Reconciler {
    store: Arc<dyn CatalogStore>,
    extractor: Arc<dyn MetadataExtractor>,
}

impl Reconciler {
    pub(crate) fn new(store: Arc<dyn CatalogStore>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { store, extractor }
    }

    /// Reconcile `scan` (a walk of `root`) against the catalog.
    ///
    /// Counters and per-file errors accumulate in `job`.
    #[instrument(skip(self, scan, job, cancel, emitter), fields(run_id = %job.id))]
    pub(crate) async fn reconcile(
        &self,
        root: &Path,
        scan: ScanResult,
        job: &mut SyncJob,
        cancel: &CancellationToken,
        emitter: &ProgressEmitter,
    ) -> Result<ReconcileOutcome> {
        let run_id = job.run_id();
        let total = scan.files.len() as u64;

        let mut lookup: HashMap<PathBuf, Track> = self
            .store
            .list_under_folder(root)
            .await?
            .into_iter()
            .map(|track| (track.path.clone(), track))
            .collect();
        debug!(catalogued = lookup.len(), scanned = total, "Reconciling");

        // Entries the walker could not read are neither visited nor removed.
        for err in scan.errors {
            lookup.retain(|_, track| !track.is_under(&err.path));
            job.record_error(&err.path, err.message.clone());
            emitter.emit(SyncEvent::FileError {
                run_id: run_id.clone(),
                path: err.path,
                message: err.message,
            });
        }

        job.update_progress(0, total, SyncPhase::Reconciling)?;
        emitter.publish_progress(&job.progress);

        for (index, path) in scan.files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = index, total, "Sync cancelled");
                return Ok(ReconcileOutcome::Cancelled);
            }

            let existing = lookup.remove(&path);
            match self.process_file(&path, existing).await {
                Ok(FileChange::Added(track_id)) => {
                    job.record_added();
                    emitter.emit(SyncEvent::TrackAdded {
                        run_id: run_id.clone(),
                        track_id: track_id.0,
                        path: path.clone(),
                    });
                }
                Ok(FileChange::Updated(track_id)) => {
                    job.record_updated();
                    emitter.emit(SyncEvent::TrackUpdated {
                        run_id: run_id.clone(),
                        track_id: track_id.0,
                        path: path.clone(),
                    });
                }
                Ok(FileChange::Unchanged) => {}
                Err(e) if e.is_file_level() => {
                    warn!(path = %path.display(), "Skipping file: {}", e);
                    job.record_error(&path, e.to_string());
                    emitter.emit(SyncEvent::FileError {
                        run_id: run_id.clone(),
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            let processed = index as u64 + 1;
            job.update_progress(processed, total, SyncPhase::Reconciling)?;
            emitter.publish_progress(&job.progress);
            emitter.emit(SyncEvent::FileProcessed {
                run_id: run_id.clone(),
                index: processed,
                total,
                path,
            });
        }

        if cancel.is_cancelled() {
            return Ok(ReconcileOutcome::Cancelled);
        }

        job.update_progress(total, total, SyncPhase::Removing)?;
        emitter.publish_progress(&job.progress);

        let mut stale: Vec<Track> = lookup.into_values().collect();
        stale.sort_by(|a, b| a.path.cmp(&b.path));
        for track in stale {
            if cancel.is_cancelled() {
                return Ok(ReconcileOutcome::Cancelled);
            }

            if self.store.delete(track.id).await? {
                job.record_removed();
                emitter.emit(SyncEvent::TrackRemoved {
                    run_id: run_id.clone(),
                    track_id: track.id.0,
                    path: track.path,
                });
            }
        }

        Ok(ReconcileOutcome::Completed)
    }

    async fn process_file(&self, path: &Path, existing: Option<Track>) -> Result<FileChange> {
        if path.to_str().is_none() {
            return Err(SyncError::UnsupportedPath {
                path: path.to_path_buf(),
            });
        }

        let fingerprint = fingerprint_file(path).await?;

        match existing {
            None => {
                let metadata = self.extractor.extract(path).await?;
                let id = self
                    .store
                    .insert(NewTrack {
                        path: path.to_path_buf(),
                        title: metadata.title,
                        artist: metadata.artist,
                        album: metadata.album,
                        duration_ms: metadata.duration_ms,
                        fingerprint,
                    })
                    .await?;
                debug!(track_id = %id, file = %file_name_of(path), "Track added");
                Ok(FileChange::Added(id))
            }
            Some(track) if track.fingerprint == fingerprint => Ok(FileChange::Unchanged),
            Some(mut track) => {
                let metadata = self.extractor.extract(path).await?;
                track.title = metadata.title;
                track.artist = metadata.artist;
                track.album = metadata.album;
                track.duration_ms = metadata.duration_ms;
                track.fingerprint = fingerprint;
                self.store.update(&track).await?;
                debug!(track_id = %track.id, file = %file_name_of(path), "Track updated");
                Ok(FileChange::Updated(track.id))
            }
        }
    }
}
