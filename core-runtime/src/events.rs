//! # Event Bus System
//!
//! Provides an event-driven architecture for the catalog core using
//! `tokio::sync::broadcast`, so modules communicate through typed events
//! instead of direct calls.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums per domain ([`SyncEvent`], [`LibraryEvent`])
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐
//! │ Sync Module  ├────────────>│           │    subscribe    ┌────────────┐
//! └──────────────┘             │ EventBus  ├────────────────>│ Subscriber │
//! ┌──────────────┐    emit     │ (broadcast│                 └────────────┘
//! │ Library ops  ├────────────>│  channel) │
//! └──────────────┘             └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Library(LibraryEvent::TagDeleted { tag_id: 7 }))
//!     .ok();
//!
//! let received = stream.recv().await.unwrap();
//! assert_eq!(received.description(), "Tag deleted");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. Treat as shutdown.
//!
//! Consumers that must not miss a single sync event should use a dedicated
//! per-run listener instead of the bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Folder synchronization events
    Sync(SyncEvent),
    /// User edits to the catalog outside of sync
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::FileError { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. })
            | CoreEvent::Sync(SyncEvent::Cancelled { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// A file that could not be reconciled during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncFileError {
    pub path: PathBuf,
    pub message: String,
}

/// Counts accumulated by a sync run.
///
/// Carried by every terminal event, whatever the outcome, so callers always
/// see the partial progress of cancelled and failed runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub errors: Vec<SyncFileError>,
}

impl SyncSummary {
    /// Total catalog mutations applied.
    pub fn changes(&self) -> u64 {
        self.added + self.updated + self.removed
    }

    pub fn error_count(&self) -> u64 {
        self.errors.len() as u64
    }
}

/// Events emitted while a folder is synchronized into the catalog.
///
/// For any run the sequence is `Started`, then per-file events in scan
/// order, then exactly one of `Completed`, `Failed` or `Cancelled`. A run that
/// fails before discovery finishes emits only `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Discovery finished; reconciliation is about to begin.
    Started {
        run_id: String,
        folder: PathBuf,
        /// Number of audio files found under the folder.
        total_files: u64,
    },
    /// One scanned file finished processing (1-based index).
    FileProcessed {
        run_id: String,
        index: u64,
        total: u64,
        path: PathBuf,
    },
    TrackAdded {
        run_id: String,
        track_id: i64,
        path: PathBuf,
    },
    TrackUpdated {
        run_id: String,
        track_id: i64,
        path: PathBuf,
    },
    TrackRemoved {
        run_id: String,
        track_id: i64,
        path: PathBuf,
    },
    /// A single file was skipped; the run continues.
    FileError {
        run_id: String,
        path: PathBuf,
        message: String,
    },
    Completed {
        run_id: String,
        summary: SyncSummary,
        duration_ms: u64,
    },
    /// The run aborted on an unrecoverable error.
    Failed {
        run_id: String,
        message: String,
        summary: SyncSummary,
    },
    Cancelled {
        run_id: String,
        summary: SyncSummary,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::FileProcessed { .. } => "File processed",
            SyncEvent::TrackAdded { .. } => "Track added",
            SyncEvent::TrackUpdated { .. } => "Track updated",
            SyncEvent::TrackRemoved { .. } => "Track removed",
            SyncEvent::FileError { .. } => "File skipped",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }

    /// Identifier of the run that produced this event.
    pub fn run_id(&self) -> &str {
        match self {
            SyncEvent::Started { run_id, .. }
            | SyncEvent::FileProcessed { run_id, .. }
            | SyncEvent::TrackAdded { run_id, .. }
            | SyncEvent::TrackUpdated { run_id, .. }
            | SyncEvent::TrackRemoved { run_id, .. }
            | SyncEvent::FileError { run_id, .. }
            | SyncEvent::Completed { run_id, .. }
            | SyncEvent::Failed { run_id, .. }
            | SyncEvent::Cancelled { run_id, .. } => run_id,
        }
    }

    /// Whether this event ends its run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncEvent::Completed { .. } | SyncEvent::Failed { .. } | SyncEvent::Cancelled { .. }
        )
    }

    /// Summary carried by a terminal event.
    pub fn summary(&self) -> Option<&SyncSummary> {
        match self {
            SyncEvent::Completed { summary, .. }
            | SyncEvent::Failed { summary, .. }
            | SyncEvent::Cancelled { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// User-driven catalog edits (tags and ratings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TagCreated { tag_id: i64, name: String },
    TagDeleted { tag_id: i64 },
    TagAssigned { track_id: i64, tag_id: i64 },
    TagUnassigned { track_id: i64, tag_id: i64 },
    RatingChanged { track_id: i64, rating: u8 },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TagCreated { .. } => "Tag created",
            LibraryEvent::TagDeleted { .. } => "Tag deleted",
            LibraryEvent::TagAssigned { .. } => "Tag assigned to track",
            LibraryEvent::TagUnassigned { .. } => "Tag removed from track",
            LibraryEvent::RatingChanged { .. } => "Track rating changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// nobody is listening. Callers usually ignore the error with `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only sync events of a single run.
    pub fn for_run(receiver: Receiver<CoreEvent>, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        Self::new(receiver).filter(move |event| {
            matches!(event, CoreEvent::Sync(sync) if sync.run_id() == run_id)
        })
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
