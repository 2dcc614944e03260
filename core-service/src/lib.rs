//! Library service façade and bootstrap.
//!
//! This crate wires the catalog database, metadata extractor, event bus and
//! sync coordinator into one [`LibraryService`] that host applications own and
//! share (typically behind an `Arc`). There is no global instance.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_library::{FilterState, SortColumn, SortState};
//! use core_runtime::config::CoreConfig;
//! use core_runtime::logging::init_logging;
//! use core_service::LibraryService;
//!
//! let config = CoreConfig::builder().database_path("catalog.db").build()?;
//! init_logging(config.logging.clone())?;
//! let service = LibraryService::bootstrap(config).await?;
//!
//! let (run, mut events) = service.start_sync_with_channel("/music")?;
//! while let Some(event) = events.recv().await {
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! run.wait().await?;
//!
//! let mut sort = SortState::default();
//! sort.click(SortColumn::Title);
//! let visible = service.view(&FilterState::default(), &sort).await?;
//! println!("{} tracks", visible.len());
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::path::Path;
use std::sync::Arc;

use core_library::repositories::{TagRepository, TrackRepository};
use core_library::{
    apply_filter_sort, create_pool, DatabaseConfig, FilterState, SortState, SqliteCatalogStore,
    SyncRun, Tag, TagId, Track, TrackEntry, TrackId,
};
use core_metadata::{LoftyExtractor, MetadataExtractor};
use core_runtime::config::{CoreConfig, DatabaseLocation};
use core_runtime::events::{CoreEvent, EventBus, EventStream, LibraryEvent, SyncEvent};
use core_sync::{
    ChannelListener, RunHandle, SyncConfig, SyncCoordinator, SyncListener, SyncProgress,
};
use sqlx::SqlitePool;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
pub struct LibraryService {
    config: CoreConfig,
    pool: SqlitePool,
    store: SqliteCatalogStore,
    event_bus: EventBus,
    coordinator: SyncCoordinator,
}

impl LibraryService {
    /// Open the catalog described by `config` and build every component, using
    /// the `lofty` extractor.
    ///
    /// Must be called from within a Tokio runtime; sync runs are spawned on it.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        Self::with_extractor(config, Arc::new(LoftyExtractor::new())).await
    }

    /// Same as [`bootstrap`](Self::bootstrap) with a caller-supplied extractor.
    #[instrument(skip(config, extractor))]
    pub async fn with_extractor(
        config: CoreConfig,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self> {
        config.validate()?;

        let db_config = match &config.database {
            DatabaseLocation::File(path) => {
                DatabaseConfig::new(path).max_connections(config.max_db_connections)
            }
            DatabaseLocation::InMemory => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;

        let store = SqliteCatalogStore::new(pool.clone());
        let event_bus = EventBus::new(config.event_buffer_size);
        let coordinator =
            SyncCoordinator::new(SyncConfig::from(&config), Arc::new(store.clone()), extractor)
                .map_err(|e| CoreError::InitializationFailed(e.to_string()))?
                .with_event_bus(event_bus.clone());

        info!(in_memory = config.is_in_memory(), "Library service ready");

        Ok(Self {
            config,
            pool,
            store,
            event_bus,
            coordinator,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Start syncing `folder`; events go to `listener` and the event bus.
    pub fn start_sync(
        &self,
        folder: impl AsRef<Path>,
        listener: Arc<dyn SyncListener>,
    ) -> Result<RunHandle> {
        Ok(self.coordinator.start_sync(folder.as_ref(), listener)?)
    }

    /// Start syncing `folder` and receive its events on a channel.
    pub fn start_sync_with_channel(
        &self,
        folder: impl AsRef<Path>,
    ) -> Result<(RunHandle, UnboundedReceiver<SyncEvent>)> {
        let (listener, receiver) = ChannelListener::new();
        let handle = self.start_sync(folder, Arc::new(listener))?;
        Ok((handle, receiver))
    }

    pub fn cancel_sync(&self) -> bool {
        self.coordinator.cancel_sync()
    }

    pub fn is_syncing(&self) -> bool {
        self.coordinator.is_syncing()
    }

    pub fn sync_status(&self) -> Option<SyncProgress> {
        self.coordinator.status()
    }

    pub async fn sync_history(&self, limit: u32) -> Result<Vec<SyncRun>> {
        Ok(self.coordinator.history(limit).await?)
    }

    // ------------------------------------------------------------------
    // Catalog views
    // ------------------------------------------------------------------

    /// Every track with its tags, in catalog order.
    pub async fn snapshot(&self) -> Result<Vec<TrackEntry>> {
        Ok(self.store.snapshot().await?)
    }

    /// One track by id, for detail views.
    pub async fn track(&self, id: TrackId) -> Result<Option<Track>> {
        Ok(self.store.tracks().find_by_id(id).await?)
    }

    /// Filtered and sorted copy of the current catalog.
    pub async fn view(&self, filter: &FilterState, sort: &SortState) -> Result<Vec<TrackEntry>> {
        let snapshot = self.snapshot().await?;
        Ok(apply_filter_sort(&snapshot, filter, sort)
            .into_iter()
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Tags & ratings
    // ------------------------------------------------------------------

    pub async fn create_tag(&self, name: &str, color: &str) -> Result<Tag> {
        let tag = self.store.tags().create(name, color).await?;
        self.emit(LibraryEvent::TagCreated {
            tag_id: tag.id.0,
            name: tag.name.clone(),
        });
        Ok(tag)
    }

    pub async fn tag(&self, id: TagId) -> Result<Option<Tag>> {
        Ok(self.store.tags().find_by_id(id).await?)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.store.tags().list().await?)
    }

    /// Delete a tag along with all its assignments.
    ///
    /// Filters still referencing the tag can be cleaned with
    /// [`FilterState::retain_tags`].
    pub async fn delete_tag(&self, id: TagId) -> Result<bool> {
        let deleted = self.store.tags().delete(id).await?;
        if deleted {
            self.emit(LibraryEvent::TagDeleted { tag_id: id.0 });
        }
        Ok(deleted)
    }

    pub async fn assign_tag(&self, track_id: TrackId, tag_id: TagId) -> Result<()> {
        self.store.tags().assign(track_id, tag_id).await?;
        self.emit(LibraryEvent::TagAssigned {
            track_id: track_id.0,
            tag_id: tag_id.0,
        });
        Ok(())
    }

    pub async fn unassign_tag(&self, track_id: TrackId, tag_id: TagId) -> Result<bool> {
        let removed = self.store.tags().unassign(track_id, tag_id).await?;
        if removed {
            self.emit(LibraryEvent::TagUnassigned {
                track_id: track_id.0,
                tag_id: tag_id.0,
            });
        }
        Ok(removed)
    }

    /// Set a track's rating, clamped to `0..=5`. Returns the stored value.
    pub async fn set_rating(&self, track_id: TrackId, rating: i64) -> Result<u8> {
        let stored = self.store.tracks().set_rating(track_id, rating).await?;
        self.emit(LibraryEvent::RatingChanged {
            track_id: track_id.0,
            rating: stored,
        });
        Ok(stored)
    }

    // ------------------------------------------------------------------
    // Events & lifecycle
    // ------------------------------------------------------------------

    /// Stream of every sync and library event from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Cancel any running sync, wait for it to settle and close the database.
    pub async fn shutdown(self, active: Option<RunHandle>) -> Result<()> {
        self.coordinator.cancel_sync();
        if let Some(handle) = active {
            handle.wait().await?;
        }
        self.pool.close().await;
        info!("Library service stopped");
        Ok(())
    }

    fn emit(&self, event: LibraryEvent) {
        self.event_bus.emit(CoreEvent::Library(event)).ok();
    }
}
