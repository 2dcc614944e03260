//! Domain models for the audio catalog
//!
//! This module contains the catalog's domain models with validation and
//! database mapping.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Highest rating a track can carry.
pub const MAX_RATING: u8 = 5;

/// Clamp an arbitrary rating value into `0..=MAX_RATING`.
pub fn clamp_rating(value: i64) -> u8 {
    value.clamp(0, MAX_RATING as i64) as u8
}

/// Current unix time in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// =============================================================================
// ID Types
// =============================================================================

/// Store-assigned identifier of a track; immutable once assigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TrackId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Store-assigned identifier of a tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TagId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of one sync run.
///
/// Generated when the run starts, before anything is persisted, so a rejected
/// start request can already name the run in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(pub Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tracks
// =============================================================================

/// One catalogued audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Absolute path, unique across the catalog
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    /// Opaque content fingerprint; equal bytes give equal fingerprints
    pub fingerprint: String,
    /// User rating in `0..=5`; never touched by sync
    pub rating: u8,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Track {
    /// Normalize a string for searching and sorting (lowercase, trimmed)
    pub fn normalize(s: &str) -> String {
        s.trim().to_lowercase()
    }

    /// Whether this track lives under `folder` (component-wise prefix).
    pub fn is_under(&self, folder: &Path) -> bool {
        self.path.starts_with(folder)
    }
}

/// Insert shape of a track: everything except the store-owned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrack {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub fingerprint: String,
}

impl NewTrack {
    /// Validate track data
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.path.is_absolute() {
            return Err(format!(
                "Track path must be absolute: {}",
                self.path.display()
            ));
        }

        if self.fingerprint.trim().is_empty() {
            return Err("Track fingerprint cannot be empty".to_string());
        }

        if self.duration_ms > i64::MAX as u64 {
            return Err("Track duration is out of range".to_string());
        }

        Ok(())
    }
}

/// Database row representation of a track
#[derive(Debug, FromRow)]
pub(crate) struct TrackRow {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: i64,
    pub fingerprint: String,
    pub rating: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<TrackRow> for Track {
    type Error = LibraryError;

    fn try_from(row: TrackRow) -> Result<Self> {
        let duration_ms = u64::try_from(row.duration_ms).map_err(|_| LibraryError::InvalidInput {
            field: "duration_ms".to_string(),
            message: format!("negative duration {} for track {}", row.duration_ms, row.id),
        })?;

        Ok(Track {
            id: TrackId(row.id),
            path: PathBuf::from(row.path),
            title: row.title,
            artist: row.artist,
            album: row.album,
            duration_ms,
            fingerprint: row.fingerprint,
            rating: clamp_rating(row.rating),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Tags
// =============================================================================

/// User-defined label that can be attached to any number of tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: TagId,
    /// Unique, case-sensitive
    pub name: String,
    /// Display color such as `#1e90ff`
    pub color: String,
}

impl Tag {
    pub fn validate_name(name: &str) -> std::result::Result<(), String> {
        if name.trim().is_empty() {
            return Err("Tag name cannot be empty".to_string());
        }
        Ok(())
    }

    /// Accepts `#rgb` and `#rrggbb` hex colors.
    pub fn validate_color(color: &str) -> std::result::Result<(), String> {
        let valid = color
            .strip_prefix('#')
            .map(|hex| {
                (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
            })
            .unwrap_or(false);

        if valid {
            Ok(())
        } else {
            Err(format!("Invalid tag color '{}': expected #rgb or #rrggbb", color))
        }
    }
}

// =============================================================================
// Sync Runs
// =============================================================================

/// Lifecycle status of a persisted sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Failed => "failed",
            SyncRunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncRunStatus::Running)
    }
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncRunStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(SyncRunStatus::Running),
            "completed" => Ok(SyncRunStatus::Completed),
            "failed" => Ok(SyncRunStatus::Failed),
            "cancelled" => Ok(SyncRunStatus::Cancelled),
            other => Err(LibraryError::InvalidInput {
                field: "status".to_string(),
                message: format!("unknown sync run status '{}'", other),
            }),
        }
    }
}

/// Persisted record of one sync execution against one folder.
///
/// Written as `Running` when the run starts and finalized exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub folder: PathBuf,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub status: SyncRunStatus,
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub error_count: u64,
    pub error_message: Option<String>,
}

impl SyncRun {
    /// Fresh record for a run that just started.
    pub fn started(id: SyncRunId, folder: impl Into<PathBuf>) -> Self {
        Self {
            id,
            folder: folder.into(),
            started_at: now_timestamp(),
            finished_at: None,
            status: SyncRunStatus::Running,
            added: 0,
            updated: 0,
            removed: 0,
            error_count: 0,
            error_message: None,
        }
    }
}

/// Database row representation of a sync run
#[derive(Debug, FromRow)]
pub(crate) struct SyncRunRow {
    pub id: String,
    pub folder: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub status: String,
    pub added: i64,
    pub updated: i64,
    pub removed: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = LibraryError;

    fn try_from(row: SyncRunRow) -> Result<Self> {
        let id = SyncRunId::from_string(&row.id).map_err(|e| LibraryError::InvalidInput {
            field: "id".to_string(),
            message: e.to_string(),
        })?;

        Ok(SyncRun {
            id,
            folder: PathBuf::from(row.folder),
            started_at: row.started_at,
            finished_at: row.finished_at,
            status: row.status.parse()?,
            added: row.added.max(0) as u64,
            updated: row.updated.max(0) as u64,
            removed: row.removed.max(0) as u64,
            error_count: row.error_count.max(0) as u64,
            error_message: row.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_track(path: &str) -> NewTrack {
        NewTrack {
            path: PathBuf::from(path),
            title: "Song".to_string(),
            artist: String::new(),
            album: String::new(),
            duration_ms: 1_000,
            fingerprint: "abc".to_string(),
        }
    }

    #[test]
    fn test_clamp_rating() {
        assert_eq!(clamp_rating(-3), 0);
        assert_eq!(clamp_rating(0), 0);
        assert_eq!(clamp_rating(4), 4);
        assert_eq!(clamp_rating(9), 5);
    }

    #[test]
    fn test_new_track_validation() {
        assert!(new_track("/music/a.mp3").validate().is_ok());
        assert!(new_track("relative/a.mp3").validate().is_err());

        let mut track = new_track("/music/a.mp3");
        track.fingerprint = "  ".to_string();
        assert!(track.validate().is_err());
    }

    #[test]
    fn test_track_row_conversion_clamps_rating() {
        let row = TrackRow {
            id: 7,
            path: "/music/a.mp3".to_string(),
            title: "A".to_string(),
            artist: "B".to_string(),
            album: "C".to_string(),
            duration_ms: 1234,
            fingerprint: "f".to_string(),
            rating: 11,
            created_at: 1,
            updated_at: 2,
        };

        let track = Track::try_from(row).unwrap();
        assert_eq!(track.id, TrackId(7));
        assert_eq!(track.rating, 5);
        assert_eq!(track.path, PathBuf::from("/music/a.mp3"));
    }

    #[test]
    fn test_track_row_rejects_negative_duration() {
        let row = TrackRow {
            id: 1,
            path: "/music/a.mp3".to_string(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            duration_ms: -1,
            fingerprint: "f".to_string(),
            rating: 0,
            created_at: 0,
            updated_at: 0,
        };
        assert!(Track::try_from(row).is_err());
    }

    #[test]
    fn test_track_is_under_respects_components() {
        let track = Track {
            id: TrackId(1),
            path: PathBuf::from("/music/rock/a.mp3"),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            duration_ms: 0,
            fingerprint: "f".to_string(),
            rating: 0,
            created_at: 0,
            updated_at: 0,
        };

        assert!(track.is_under(Path::new("/music")));
        assert!(track.is_under(Path::new("/music/rock")));
        assert!(!track.is_under(Path::new("/music/ro")));
    }

    #[test]
    fn test_tag_validation() {
        assert!(Tag::validate_name("Rock").is_ok());
        assert!(Tag::validate_name("   ").is_err());
        assert!(Tag::validate_color("#fff").is_ok());
        assert!(Tag::validate_color("#1E90FF").is_ok());
        assert!(Tag::validate_color("1e90ff").is_err());
        assert!(Tag::validate_color("#12345g").is_err());
    }

    #[test]
    fn test_sync_run_status_round_trip() {
        for status in [
            SyncRunStatus::Running,
            SyncRunStatus::Completed,
            SyncRunStatus::Failed,
            SyncRunStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<SyncRunStatus>().unwrap(), status);
        }
        assert!("paused".parse::<SyncRunStatus>().is_err());
        assert!(!SyncRunStatus::Running.is_terminal());
        assert!(SyncRunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_sync_run_started() {
        let id = SyncRunId::new();
        let run = SyncRun::started(id, "/music");
        assert_eq!(run.id, id);
        assert_eq!(run.status, SyncRunStatus::Running);
        assert!(run.finished_at.is_none());
        assert!(run.started_at > 0);
    }

    #[test]
    fn test_sync_run_id_parsing() {
        let id = SyncRunId::new();
        assert_eq!(SyncRunId::from_string(&id.to_string()).unwrap(), id);
        assert!(SyncRunId::from_string("not-a-uuid").is_err());
    }
}
