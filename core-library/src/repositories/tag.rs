//! Tag repository: tag definitions and track assignments

use crate::error::{LibraryError, Result};
use crate::models::{Tag, TagId, TrackId};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a tag; names are unique and compared case-sensitively
    async fn create(&self, name: &str, color: &str) -> Result<Tag>;

    async fn find_by_id(&self, id: TagId) -> Result<Option<Tag>>;

    /// All tags ordered by name
    async fn list(&self) -> Result<Vec<Tag>>;

    /// Delete a tag and every assignment of it
    async fn delete(&self, id: TagId) -> Result<bool>;

    /// Attach a tag to a track; attaching twice is a no-op
    async fn assign(&self, track_id: TrackId, tag_id: TagId) -> Result<()>;

    /// Detach a tag; returns whether an assignment existed
    async fn unassign(&self, track_id: TrackId, tag_id: TagId) -> Result<bool>;

    async fn tags_for_track(&self, track_id: TrackId) -> Result<Vec<TagId>>;

    /// Every (track, tag) pair in the catalog
    async fn assignments(&self) -> Result<Vec<(TrackId, TagId)>>;
}

pub struct SqliteTagRepository {
    pool: SqlitePool,
}

impl SqliteTagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    async fn create(&self, name: &str, color: &str) -> Result<Tag> {
        Tag::validate_name(name).map_err(|message| LibraryError::InvalidInput {
            field: "name".to_string(),
            message,
        })?;
        Tag::validate_color(color).map_err(|message| LibraryError::InvalidInput {
            field: "color".to_string(),
            message,
        })?;

        let result = sqlx::query("INSERT INTO tags (name, color) VALUES (?, ?)")
            .bind(name)
            .bind(color)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    LibraryError::Duplicate {
                        entity_type: "Tag".to_string(),
                        value: name.to_string(),
                    }
                } else {
                    LibraryError::Database(e)
                }
            })?;

        Ok(Tag {
            id: TagId(result.last_insert_rowid()),
            name: name.to_string(),
            color: color.to_string(),
        })
    }

    async fn find_by_id(&self, id: TagId) -> Result<Option<Tag>> {
        let tag = query_as::<_, Tag>("SELECT id, name, color FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    async fn list(&self) -> Result<Vec<Tag>> {
        let tags = query_as::<_, Tag>("SELECT id, name, color FROM tags ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    async fn delete(&self, id: TagId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn assign(&self, track_id: TrackId, tag_id: TagId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO track_tags (track_id, tag_id) VALUES (?, ?)")
            .bind(track_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if foreign_key_violation(&e) {
                    LibraryError::NotFound {
                        entity_type: "Track or Tag".to_string(),
                        id: format!("{}/{}", track_id, tag_id),
                    }
                } else {
                    LibraryError::Database(e)
                }
            })?;

        Ok(())
    }

    async fn unassign(&self, track_id: TrackId, tag_id: TagId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM track_tags WHERE track_id = ? AND tag_id = ?")
            .bind(track_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn tags_for_track(&self, track_id: TrackId) -> Result<Vec<TagId>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT tag_id FROM track_tags WHERE track_id = ? ORDER BY tag_id")
                .bind(track_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| TagId(id)).collect())
    }

    async fn assignments(&self) -> Result<Vec<(TrackId, TagId)>> {
        let rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT track_id, tag_id FROM track_tags ORDER BY track_id, tag_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(track, tag)| (TrackId(track), TagId(tag)))
            .collect())
    }
}
