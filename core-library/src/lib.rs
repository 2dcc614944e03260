//! # Catalog Library Module
//!
//! Owns the catalog database and the read-side view engine.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repository patterns for tracks, tags and sync runs
//! - The [`CatalogStore`](catalog::CatalogStore) contract used by sync
//! - Tri-state filtering and cyclic sorting over catalog snapshots

pub mod catalog;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod repositories;

pub use catalog::{CatalogStore, SqliteCatalogStore, TrackEntry};
pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    clamp_rating, now_timestamp, NewTrack, SyncRun, SyncRunId, SyncRunStatus, Tag, TagId, Track,
    TrackId, MAX_RATING,
};
pub use query::{apply_filter_sort, FilterState, SortColumn, SortDirection, SortState, TriState};
