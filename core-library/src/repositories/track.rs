//! Track repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{clamp_rating, now_timestamp, NewTrack, Track, TrackId, TrackRow};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use std::path::Path;

const TRACK_COLUMNS: &str =
    "id, path, title, artist, album, duration_ms, fingerprint, rating, created_at, updated_at";

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its ID
    async fn find_by_id(&self, id: TrackId) -> Result<Option<Track>>;

    /// Find a track by its absolute path
    async fn find_by_path(&self, path: &Path) -> Result<Option<Track>>;

    /// Insert a new track and return the store-assigned id
    ///
    /// # Errors
    /// Returns error if:
    /// - Track validation fails
    /// - A track with the same path already exists
    /// - Database error occurs
    async fn insert(&self, track: &NewTrack) -> Result<TrackId>;

    /// Update the sync-owned fields of an existing track
    ///
    /// Writes path, title, artist, album, duration and fingerprint and bumps
    /// `updated_at`. Rating and creation time are left untouched.
    ///
    /// # Errors
    /// Returns `NotFound` if the track does not exist
    async fn update(&self, track: &Track) -> Result<()>;

    /// Delete a track by ID
    ///
    /// # Returns
    /// - `Ok(true)` if track was deleted
    /// - `Ok(false)` if track was not found
    async fn delete(&self, id: TrackId) -> Result<bool>;

    /// All tracks whose path lies under `folder`, in id order
    ///
    /// Matching is on path components: `/music/rock` does not contain
    /// `/music/rockabilly/a.mp3`.
    async fn list_under_folder(&self, folder: &Path) -> Result<Vec<Track>>;

    /// All tracks in catalog (id) order
    async fn list_all(&self) -> Result<Vec<Track>>;

    /// Set a track's rating, clamped to `0..=5`; returns the stored value
    async fn set_rating(&self, id: TrackId, rating: i64) -> Result<u8>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    /// Create a new SQLite track repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Stored form of a path. Paths are kept as text, so they must be valid UTF-8.
fn path_text(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| LibraryError::InvalidInput {
        field: "path".to_string(),
        message: format!("path is not valid UTF-8: {}", path.display()),
    })
}

/// Prefix every catalogued descendant of `folder` starts with.
fn folder_prefix(folder: &Path) -> Result<String> {
    let mut prefix = path_text(folder)?.to_string();
    if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
        prefix.push(std::path::MAIN_SEPARATOR);
    }
    Ok(prefix)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: TrackId) -> Result<Option<Track>> {
        let row = query_as::<_, TrackRow>(&format!(
            "SELECT {} FROM tracks WHERE id = ?",
            TRACK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Track::try_from).transpose()
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Track>> {
        // Only UTF-8 paths are ever stored
        let Some(path) = path.to_str() else {
            return Ok(None);
        };

        let row = query_as::<_, TrackRow>(&format!(
            "SELECT {} FROM tracks WHERE path = ?",
            TRACK_COLUMNS
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Track::try_from).transpose()
    }

    async fn insert(&self, track: &NewTrack) -> Result<TrackId> {
        track.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "track".to_string(),
            message: msg,
        })?;

        let now = now_timestamp();
        let path = path_text(&track.path)?;
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (
                path, title, artist, album, duration_ms, fingerprint,
                rating, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(path)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_ms as i64)
        .bind(&track.fingerprint)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LibraryError::Duplicate {
                    entity_type: "Track path".to_string(),
                    value: path.to_string(),
                }
            } else {
                LibraryError::Database(e)
            }
        })?;

        Ok(TrackId(result.last_insert_rowid()))
    }

    async fn update(&self, track: &Track) -> Result<()> {
        let path = path_text(&track.path)?;
        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                path = ?, title = ?, artist = ?, album = ?,
                duration_ms = ?, fingerprint = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(path)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_ms as i64)
        .bind(&track.fingerprint)
        .bind(now_timestamp())
        .bind(track.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: track.id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: TrackId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_under_folder(&self, folder: &Path) -> Result<Vec<Track>> {
        let prefix = folder_prefix(folder)?;

        // substr() compares exactly; LIKE would treat '%' and '_' in paths as wildcards
        let rows = query_as::<_, TrackRow>(&format!(
            "SELECT {} FROM tracks WHERE substr(path, 1, ?) = ? ORDER BY id",
            TRACK_COLUMNS
        ))
        .bind(prefix.chars().count() as i64)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Track::try_from).collect()
    }

    async fn list_all(&self) -> Result<Vec<Track>> {
        let rows = query_as::<_, TrackRow>(&format!(
            "SELECT {} FROM tracks ORDER BY id",
            TRACK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Track::try_from).collect()
    }

    async fn set_rating(&self, id: TrackId, rating: i64) -> Result<u8> {
        let rating = clamp_rating(rating);

        let result = sqlx::query("UPDATE tracks SET rating = ? WHERE id = ?")
            .bind(rating as i64)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: id.to_string(),
            });
        }

        Ok(rating)
    }
}
