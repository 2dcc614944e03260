//! # Metadata Module
//!
//! Reads what the catalog needs to know about a single audio file.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC) behind the
//!   [`MetadataExtractor`] trait
//! - Content fingerprinting (SHA-256) used to detect changed files

pub mod error;
pub mod extractor;
pub mod fingerprint;

pub use error::{MetadataError, Result};
pub use extractor::{LoftyExtractor, MetadataExtractor, TrackMetadata};
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
