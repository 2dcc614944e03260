//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `TrackRepository` - Catalogued audio files
//! - `TagRepository` - Tags and their many-to-many assignment to tracks
//! - `SyncRunRepository` - History of folder sync runs

pub mod sync_run;
pub mod tag;
pub mod track;

pub use sync_run::{SqliteSyncRunRepository, SyncRunRepository};
pub use tag::{SqliteTagRepository, TagRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
