//! # Catalog Store
//!
//! The persistence contract the sync engine writes through, plus its SQLite
//! implementation.
//!
//! ## Overview
//!
//! [`CatalogStore`] is deliberately narrow: it exposes only the record
//! operations reconciliation needs (insert, update, delete, lookups by path
//! and folder) and sync-run bookkeeping. Tag and rating edits go through the
//! repositories directly, since they never happen inside a sync run.
//!
//! [`SqliteCatalogStore`] composes the track, tag and sync-run repositories
//! over one pool and additionally builds the in-memory [`TrackEntry`] snapshot
//! consumed by the filter/sort engine.

use crate::error::Result;
use crate::models::{NewTrack, SyncRun, TagId, Track, TrackId};
use crate::repositories::{
    SqliteSyncRunRepository, SqliteTagRepository, SqliteTrackRepository, SyncRunRepository,
    TagRepository, TrackRepository,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A track together with the set of tags it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub track: Track,
    pub tags: BTreeSet<TagId>,
}

impl TrackEntry {
    pub fn new(track: Track) -> Self {
        Self {
            track,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags(track: Track, tags: impl IntoIterator<Item = TagId>) -> Self {
        Self {
            track,
            tags: tags.into_iter().collect(),
        }
    }

    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }
}

/// Record store consumed by the sync engine.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a track and return its new id.
    async fn insert(&self, track: NewTrack) -> Result<TrackId>;

    /// Rewrite the sync-owned fields of a track. Rating is preserved.
    async fn update(&self, track: &Track) -> Result<()>;

    /// Delete a track; `false` if it did not exist.
    async fn delete(&self, id: TrackId) -> Result<bool>;

    async fn find_by_path(&self, path: &Path) -> Result<Option<Track>>;

    /// Tracks whose path lies under `folder`.
    async fn list_under_folder(&self, folder: &Path) -> Result<Vec<Track>>;

    async fn list_all(&self) -> Result<Vec<Track>>;

    /// Insert a running sync run or finalize it.
    async fn record_sync_run(&self, run: &SyncRun) -> Result<()>;

    /// Most recent sync runs first.
    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRun>>;
}

/// SQLite-backed catalog.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    tracks: Arc<SqliteTrackRepository>,
    tags: Arc<SqliteTagRepository>,
    runs: Arc<SqliteSyncRunRepository>,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            tracks: Arc::new(SqliteTrackRepository::new(pool.clone())),
            tags: Arc::new(SqliteTagRepository::new(pool.clone())),
            runs: Arc::new(SqliteSyncRunRepository::new(pool)),
        }
    }

    pub fn tracks(&self) -> &SqliteTrackRepository {
        &self.tracks
    }

    pub fn tags(&self) -> &SqliteTagRepository {
        &self.tags
    }

    /// Every track with its tag set, in catalog (id) order.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<Vec<TrackEntry>> {
        let tracks = self.tracks.list_all().await?;
        let mut tags_by_track: HashMap<TrackId, BTreeSet<TagId>> = HashMap::new();
        for (track, tag) in self.tags.assignments().await? {
            tags_by_track.entry(track).or_default().insert(tag);
        }

        let entries: Vec<TrackEntry> = tracks
            .into_iter()
            .map(|track| {
                let tags = tags_by_track.remove(&track.id).unwrap_or_default();
                TrackEntry { track, tags }
            })
            .collect();

        debug!(tracks = entries.len(), "Catalog snapshot built");
        Ok(entries)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn insert(&self, track: NewTrack) -> Result<TrackId> {
        self.tracks.insert(&track).await
    }

    async fn update(&self, track: &Track) -> Result<()> {
        self.tracks.update(track).await
    }

    async fn delete(&self, id: TrackId) -> Result<bool> {
        self.tracks.delete(id).await
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Track>> {
        self.tracks.find_by_path(path).await
    }

    async fn list_under_folder(&self, folder: &Path) -> Result<Vec<Track>> {
        self.tracks.list_under_folder(folder).await
    }

    async fn list_all(&self) -> Result<Vec<Track>> {
        self.tracks.list_all().await
    }

    async fn record_sync_run(&self, run: &SyncRun) -> Result<()> {
        self.runs.record(run).await
    }

    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRun>> {
        self.runs.recent(limit).await
    }
}
