//! # Sync Module
//!
//! Keeps the catalog in step with folders on disk.
//!
//! ## Overview
//!
//! This module manages the lifecycle of folder syncs, including:
//! - Walking a folder for audio files
//! - Fingerprinting files and extracting metadata for new or changed ones
//! - Adding, updating and removing catalog tracks
//! - Reporting progress to a listener and the event bus
//!
//! ## Components
//!
//! - **Folder Scanner** (`scanner`): Lazy, restartable walk of a root directory
//! - **Sync Job State Machine** (`job`): Run lifecycle with validated transitions
//! - **Reconciler** (`reconciler`): Diffs one scan against the catalog
//! - **Listeners** (`listener`): Delivery of run events
//! - **Sync Coordinator** (`coordinator`): Single-run orchestration and cancellation

pub mod coordinator;
pub mod error;
pub mod job;
pub mod listener;
mod reconciler;
pub mod scanner;

pub use coordinator::{RunHandle, SyncConfig, SyncCoordinator, SyncReport};
pub use error::{Result, SyncError};
pub use job::{SyncJob, SyncPhase, SyncProgress};
pub use listener::{ChannelListener, NullListener, SyncListener};
pub use scanner::{FolderScanner, ScanError, ScanIter, ScanResult};
