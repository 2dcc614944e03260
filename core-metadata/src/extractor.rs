//! Audio Tag Extraction
//!
//! This module reads the catalog-facing metadata of an audio file using the
//! `lofty` crate. It supports ID3v2, Vorbis Comments, MP4 tags, RIFF INFO and
//! FLAC.
//!
//! ## Overview
//!
//! - Extracts title, artist, album and duration
//! - Normalizes text (trims and collapses whitespace, drops control characters)
//! - Falls back to the file stem when the file carries no title
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{LoftyExtractor, MetadataExtractor};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = LoftyExtractor::new();
//! let metadata = extractor.extract(Path::new("song.mp3")).await?;
//!
//! println!("Title: {}", metadata.title);
//! println!("Duration: {}ms", metadata.duration_ms);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use lofty::config::ParseOptions;
use lofty::error::ErrorKind;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

/// Metadata the catalog stores for a track.
///
/// Text fields are empty strings when the file has no value for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
}

/// Reads [`TrackMetadata`] from a file on disk.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract metadata from the audio file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a recognizable
    /// audio file.
    async fn extract(&self, path: &Path) -> Result<TrackMetadata>;
}

/// `lofty`-backed extractor
#[derive(Debug, Clone, Copy)]
pub struct LoftyExtractor {
    parse_options: ParseOptions,
}

impl LoftyExtractor {
    /// Create a new extractor with default parse options
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    /// Create extractor with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    fn parse(parse_options: ParseOptions, path: &Path, data: &[u8]) -> Result<TrackMetadata> {
        let tagged_file = Probe::new(Cursor::new(data))
            .options(parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| match e.kind() {
                ErrorKind::UnknownFormat => {
                    MetadataError::UnsupportedFormat(path.display().to_string())
                }
                _ => MetadataError::CorruptedFile(format!("{}: {}", path.display(), e)),
            })?;

        let duration_ms = tagged_file.properties().duration().as_millis() as u64;

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        let (title, artist, album) = match tag {
            Some(tag) => (
                tag.title().map(|s| Self::normalize_text(s.as_ref())),
                tag.artist().map(|s| Self::normalize_text(s.as_ref())),
                tag.album().map(|s| Self::normalize_text(s.as_ref())),
            ),
            None => {
                warn!(path = %path.display(), "No tags found, using file name as title");
                (None, None, None)
            }
        };

        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| Self::file_stem(path));

        Ok(TrackMetadata {
            title,
            artist: artist.unwrap_or_default(),
            album: album.unwrap_or_default(),
            duration_ms,
        })
    }

    /// Normalize text metadata
    ///
    /// - Trims leading/trailing whitespace
    /// - Normalizes consecutive whitespace to single space
    /// - Removes null bytes and control characters
    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect()
    }

    fn file_stem(path: &Path) -> String {
        path.file_stem()
            .map(|s| Self::normalize_text(&s.to_string_lossy()))
            .unwrap_or_default()
    }
}

impl Default for LoftyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for LoftyExtractor {
    async fn extract(&self, path: &Path) -> Result<TrackMetadata> {
        debug!("Extracting metadata from: {}", path.display());

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| MetadataError::from_io(path, e))?;

        let parse_options = self.parse_options;
        let owned_path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::parse(parse_options, &owned_path, &data))
            .await
            .map_err(|e| MetadataError::ExtractionFailed(format!("Parser task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            LoftyExtractor::normalize_text("  Hello   World  "),
            "Hello World"
        );
        assert_eq!(
            LoftyExtractor::normalize_text("Title\nWith\tWhitespace"),
            "Title With Whitespace"
        );
        assert_eq!(LoftyExtractor::normalize_text("Nul\0Byte"), "NulByte");
        assert_eq!(LoftyExtractor::normalize_text("Clean Text"), "Clean Text");
    }

    #[test]
    fn test_file_stem_fallback() {
        assert_eq!(
            LoftyExtractor::file_stem(Path::new("/music/01  Intro.flac")),
            "01 Intro"
        );
        assert_eq!(LoftyExtractor::file_stem(Path::new("/")), "");
    }

    #[test]
    fn test_parse_rejects_unknown_bytes() {
        let result = LoftyExtractor::parse(
            ParseOptions::new(),
            Path::new("/music/notes.mp3"),
            b"This is not a valid audio file",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extractor_default() {
        let extractor1 = LoftyExtractor::new();
        let extractor2 = LoftyExtractor::default();

        assert_eq!(
            format!("{:?}", extractor1.parse_options),
            format!("{:?}", extractor2.parse_options)
        );
    }
}
