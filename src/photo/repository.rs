//! Photo metadata repository.
//!
//! CRUD operations over the `photos` table. Both originals and thumbnails
//! live in the same table and are paired by `file_name`.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{GalleryError, Result};

use super::types::{NewPhoto, Photo, PhotoKind, ThumbnailStatus};

const SELECT_PHOTO: &str = "SELECT id, kind, file_name, location, format, size_bytes, width, height,
                                   status, created_at
                            FROM photos";

/// Repository for photo CRUD operations.
pub struct PhotoRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PhotoRepository<'a> {
    /// Create a new PhotoRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new photo row.
    ///
    /// Returns the created photo with the assigned ID. Fails if a row of the
    /// same kind already exists for the file name.
    pub async fn create(&self, photo: &NewPhoto) -> Result<Photo> {
        let result = sqlx::query(
            "INSERT INTO photos (kind, file_name, location, format, size_bytes, width, height, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(photo.kind.as_str())
        .bind(&photo.file_name)
        .bind(&photo.location)
        .bind(photo.format.as_str())
        .bind(photo.dimensions.size_bytes as i64)
        .bind(photo.dimensions.width as i64)
        .bind(photo.dimensions.height as i64)
        .bind(photo.status.as_str())
        .execute(self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    /// Insert a photo row unless one of the same kind exists for the file name.
    ///
    /// Returns the stored row and whether it was created by this call.
    pub async fn create_if_absent(&self, photo: &NewPhoto) -> Result<(Photo, bool)> {
        let result = sqlx::query(
            "INSERT INTO photos (kind, file_name, location, format, size_bytes, width, height, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(photo.kind.as_str())
        .bind(&photo.file_name)
        .bind(&photo.location)
        .bind(photo.format.as_str())
        .bind(photo.dimensions.size_bytes as i64)
        .bind(photo.dimensions.width as i64)
        .bind(photo.dimensions.height as i64)
        .bind(photo.status.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            let created = self.get(result.last_insert_rowid()).await?;
            return Ok((created, true));
        }

        let existing = self
            .find_sibling(&photo.file_name, photo.kind)
            .await?
            .ok_or_else(|| {
                GalleryError::Database(format!(
                    "insert of {} {} conflicted with a row that does not exist",
                    photo.kind, photo.file_name
                ))
            })?;
        Ok((existing, false))
    }

    /// Record a derived thumbnail and mark its original ready, atomically.
    ///
    /// The thumbnail row is only inserted while the original row exists, so a
    /// derivation that finishes after its original was deleted leaves nothing
    /// behind. An existing thumbnail row for the file name is reused.
    ///
    /// Returns `None` if the original is gone.
    pub async fn attach_thumbnail(
        &self,
        original_id: i64,
        thumbnail: &NewPhoto,
    ) -> Result<Option<Photo>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO photos (kind, file_name, location, format, size_bytes, width, height, status)
             SELECT 'thumbnail', ?, ?, ?, ?, ?, ?, 'ready'
             WHERE EXISTS (SELECT 1 FROM photos WHERE id = ? AND kind = 'original')
             ON CONFLICT DO NOTHING",
        )
        .bind(&thumbnail.file_name)
        .bind(&thumbnail.location)
        .bind(thumbnail.format.as_str())
        .bind(thumbnail.dimensions.size_bytes as i64)
        .bind(thumbnail.dimensions.width as i64)
        .bind(thumbnail.dimensions.height as i64)
        .bind(original_id)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE photos SET status = 'ready' WHERE id = ? AND kind = 'original'",
        )
        .bind(original_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let photo = sqlx::query_as::<_, Photo>(&format!(
            "{SELECT_PHOTO} WHERE file_name = ? AND kind = 'thumbnail'"
        ))
        .bind(&thumbnail.file_name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(photo))
    }

    /// List all photos, originals and thumbnails, in insertion order.
    pub async fn list(&self) -> Result<Vec<Photo>> {
        let photos = sqlx::query_as::<_, Photo>(&format!("{SELECT_PHOTO} ORDER BY id"))
            .fetch_all(self.pool)
            .await?;
        Ok(photos)
    }

    /// Get a photo by ID.
    pub async fn find(&self, id: i64) -> Result<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(&format!("{SELECT_PHOTO} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(photo)
    }

    /// Get a photo by ID, failing with `NotFound` if it doesn't exist.
    pub async fn get(&self, id: i64) -> Result<Photo> {
        self.find(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(format!("photo {id}")))
    }

    /// Find the row of the given kind sharing a file name.
    ///
    /// Used to locate an original's thumbnail and a thumbnail's original.
    pub async fn find_sibling(&self, file_name: &str, kind: PhotoKind) -> Result<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(&format!(
            "{SELECT_PHOTO} WHERE file_name = ? AND kind = ?"
        ))
        .bind(file_name)
        .bind(kind.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(photo)
    }

    /// Find the original stored under a content-derived name.
    pub async fn find_original_by_file_name(&self, file_name: &str) -> Result<Option<Photo>> {
        self.find_sibling(file_name, PhotoKind::Original).await
    }

    /// Update the derivation status of an original.
    ///
    /// Returns false if no original with that ID exists.
    pub async fn set_status(&self, id: i64, status: ThumbnailStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE photos SET status = ? WHERE id = ? AND kind = 'original'")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List originals whose thumbnail is still pending or has failed.
    pub async fn list_unfinished_originals(&self) -> Result<Vec<Photo>> {
        let photos = sqlx::query_as::<_, Photo>(&format!(
            "{SELECT_PHOTO} WHERE kind = 'original' AND status != 'ready' ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(photos)
    }

    /// Delete a set of rows in one transaction.
    ///
    /// Either every listed row that exists is removed or none are.
    /// Returns the number of rows removed.
    pub async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("DELETE FROM photos WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let mut tx = self.pool.begin().await?;
        let result = query.build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Count all rows.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM photos")
            .fetch_one(self.pool)
            .await?;
        Ok(count.0)
    }
}
