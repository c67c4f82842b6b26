//! Photo service.
//!
//! This module provides the high-level gallery operations:
//! - Ingest with format and size checks, content addressing and dedupe
//! - Listing and lookup
//! - Paired deletion of an original and its thumbnail
//! - Re-queueing thumbnails that failed or never finished

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{StorageConfig, ThumbnailConfig};
use crate::db::Database;
use crate::{GalleryError, Result};

use super::format::ImageFormat;
use super::repository::PhotoRepository;
use super::store::ContentStore;
use super::types::{NewPhoto, Photo, PhotoKind, ThumbnailStatus};
use super::worker::{self, DerivationEvent, ThumbnailJob, ThumbnailQueue, ThumbnailWorker};

/// Photo service shared by request handlers.
#[derive(Debug, Clone)]
pub struct PhotoService {
    db: Arc<Database>,
    store: ContentStore,
    queue: ThumbnailQueue,
    max_upload_bytes: u64,
}

impl PhotoService {
    /// Create a new PhotoService over an existing store and queue.
    pub fn new(
        db: Arc<Database>,
        store: ContentStore,
        queue: ThumbnailQueue,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            store,
            queue,
            max_upload_bytes,
        }
    }

    /// Create a PhotoService together with the thumbnail worker feeding it.
    ///
    /// The worker is returned unstarted; spawn it before ingesting.
    pub fn with_worker(
        db: Arc<Database>,
        storage: &StorageConfig,
        thumbnails: &ThumbnailConfig,
    ) -> Result<(Self, ThumbnailWorker)> {
        let store = ContentStore::new(storage.clone())?;
        let (queue, worker) = worker::channel(db.clone(), store.clone(), thumbnails);
        let service = Self::new(db, store, queue, storage.max_upload_bytes);
        Ok((service, worker))
    }

    /// Get the content store.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Subscribe to thumbnail derivation events.
    pub fn subscribe(&self) -> broadcast::Receiver<DerivationEvent> {
        self.queue.subscribe()
    }

    /// Ingest an uploaded image.
    ///
    /// # Validation
    /// - Media type: `image/jpeg`, `image/png` or `image/gif`
    /// - Size: non-empty and at most the configured upload limit
    /// - Content: magic bytes must match the declared format
    ///
    /// # Returns
    /// The original record, with its thumbnail pending. If the same bytes were
    /// uploaded before, the existing record is returned instead and any of its
    /// files lost to an interrupted deletion are restored.
    pub async fn ingest(&self, content: &[u8], media_type: &str) -> Result<Photo> {
        let format = ImageFormat::from_media_type(media_type)?;

        if content.is_empty() {
            return Err(GalleryError::Validation("upload is empty".to_string()));
        }
        if content.len() as u64 > self.max_upload_bytes {
            return Err(GalleryError::Validation(format!(
                "upload is {} bytes, the limit is {} bytes",
                content.len(),
                self.max_upload_bytes
            )));
        }
        format.verify_signature(content)?;

        let staged = self.store.stage(content, format).await?;
        let digest = ContentStore::hash(staged.path()).await?;
        let file_name = ContentStore::content_name(&digest, format);

        let repo = PhotoRepository::new(self.db.pool());
        if let Some(existing) = repo.find_original_by_file_name(&file_name).await? {
            // Same bytes, so overwriting also restores a lost original file
            self.store.commit(staged, &digest, format).await?;
            return self.reuse(existing).await;
        }

        let path = self.store.commit(staged, &digest, format).await?;

        let dimensions = match ContentStore::inspect(&path).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                self.discard_unreferenced(&file_name).await;
                return Err(e);
            }
        };

        let new_photo = NewPhoto::original(
            &file_name,
            self.store.location_of(PhotoKind::Original, &file_name),
            format,
            dimensions,
        );
        let (photo, created) = match repo.create_if_absent(&new_photo).await {
            Ok(result) => result,
            Err(e) => {
                self.discard_unreferenced(&file_name).await;
                return Err(e);
            }
        };

        if !created {
            // Lost a race with an identical upload
            return self.reuse(photo).await;
        }

        info!(
            "Stored photo {} as {} ({}x{}, {} bytes)",
            photo.id, photo.file_name, photo.width, photo.height, photo.size_bytes
        );
        self.schedule(photo).await
    }

    /// List all photos, originals and thumbnails, in insertion order.
    pub async fn list(&self) -> Result<Vec<Photo>> {
        PhotoRepository::new(self.db.pool()).list().await
    }

    /// Get a photo by ID.
    pub async fn get(&self, id: i64) -> Result<Photo> {
        PhotoRepository::new(self.db.pool()).get(id).await
    }

    /// Delete an original together with its thumbnail.
    ///
    /// Files are removed before rows, so a failure never leaves a row pointing
    /// at nothing without saying so:
    /// - Unknown ID: `NotFound`, nothing touched
    /// - Thumbnail ID: `InvalidOperation`, nothing touched
    /// - Original file removal fails: `Io`, nothing else touched
    /// - Any later step fails: `PartialDeletion`
    ///
    /// An original file that is already gone counts as removed, so a deletion
    /// that failed part way can be retried.
    ///
    /// A concurrent `get` of the same ID may still return the record or may
    /// see `NotFound`; readers get no isolation from a deletion in progress.
    ///
    /// # Returns
    /// The deleted original record.
    pub async fn delete(&self, id: i64) -> Result<Photo> {
        let repo = PhotoRepository::new(self.db.pool());

        let original = repo.get(id).await?;
        if !original.is_original() {
            return Err(GalleryError::InvalidOperation(format!(
                "photo {id} is a thumbnail, delete its original instead"
            )));
        }

        self.store
            .remove(PhotoKind::Original, &original.file_name)
            .await?;

        let thumbnail = repo
            .find_sibling(&original.file_name, original.kind.sibling())
            .await
            .map_err(|e| {
                GalleryError::PartialDeletion(format!(
                    "original file of photo {id} removed, thumbnail lookup failed: {e}"
                ))
            })?;

        let mut ids = vec![original.id];
        if let Some(thumbnail) = &thumbnail {
            self.store
                .remove(PhotoKind::Thumbnail, &thumbnail.file_name)
                .await
                .map_err(|e| {
                    GalleryError::PartialDeletion(format!(
                        "original file of photo {id} removed, thumbnail file {} left: {e}",
                        thumbnail.file_name
                    ))
                })?;
            ids.push(thumbnail.id);
        }

        repo.delete_many(&ids).await.map_err(|e| {
            GalleryError::PartialDeletion(format!(
                "files of photo {id} removed, rows {ids:?} left: {e}"
            ))
        })?;

        if thumbnail.is_none() {
            self.sweep_late_thumbnail(&repo, &original).await?;
        }

        info!("Deleted photo {} ({})", original.id, original.file_name);
        Ok(original)
    }

    /// Queue the thumbnail of an original whose derivation failed.
    pub async fn retry_thumbnail(&self, id: i64) -> Result<Photo> {
        let repo = PhotoRepository::new(self.db.pool());

        let mut photo = repo.get(id).await?;
        if !photo.is_original() {
            return Err(GalleryError::InvalidOperation(format!(
                "photo {id} is a thumbnail"
            )));
        }
        if photo.status != ThumbnailStatus::Failed {
            return Err(GalleryError::InvalidOperation(format!(
                "thumbnail of photo {id} is {}, only failed thumbnails can be retried",
                photo.status
            )));
        }

        repo.set_status(id, ThumbnailStatus::Pending).await?;
        photo.status = ThumbnailStatus::Pending;
        self.schedule(photo).await
    }

    /// Queue every original whose thumbnail is pending or failed.
    ///
    /// Meant to run once at startup, after the worker has been spawned.
    ///
    /// # Returns
    /// The number of jobs queued.
    pub async fn reconcile(&self) -> Result<usize> {
        let repo = PhotoRepository::new(self.db.pool());
        let unfinished = repo.list_unfinished_originals().await?;

        let mut queued = 0;
        for mut photo in unfinished {
            if photo.status == ThumbnailStatus::Failed {
                repo.set_status(photo.id, ThumbnailStatus::Pending).await?;
                photo.status = ThumbnailStatus::Pending;
            }
            if self.schedule(photo).await?.status == ThumbnailStatus::Pending {
                queued += 1;
            }
        }

        if queued > 0 {
            info!("Queued {} unfinished thumbnail(s)", queued);
        }
        Ok(queued)
    }

    /// Return an existing original for a repeated upload.
    ///
    /// The thumbnail is queued again if it failed, or if it is marked ready but
    /// its file is gone.
    async fn reuse(&self, mut existing: Photo) -> Result<Photo> {
        info!(
            "Upload matches existing photo {} ({})",
            existing.id, existing.file_name
        );

        let rederive = match existing.status {
            ThumbnailStatus::Failed => true,
            ThumbnailStatus::Ready => !self
                .store
                .exists(PhotoKind::Thumbnail, &existing.file_name),
            ThumbnailStatus::Pending => false,
        };
        if !rederive {
            return Ok(existing);
        }

        let repo = PhotoRepository::new(self.db.pool());
        repo.set_status(existing.id, ThumbnailStatus::Pending).await?;
        existing.status = ThumbnailStatus::Pending;
        self.schedule(existing).await
    }

    /// Queue the thumbnail job for an original.
    ///
    /// If the worker is gone the original is marked failed and still returned.
    async fn schedule(&self, mut photo: Photo) -> Result<Photo> {
        let job = ThumbnailJob {
            original_id: photo.id,
            file_name: photo.file_name.clone(),
            format: photo.format,
        };

        if let Err(e) = self.queue.enqueue(job).await {
            warn!("Could not queue thumbnail for photo {}: {}", photo.id, e);
            PhotoRepository::new(self.db.pool())
                .set_status(photo.id, ThumbnailStatus::Failed)
                .await?;
            photo.status = ThumbnailStatus::Failed;
        }

        Ok(photo)
    }

    /// Remove a committed original that no row references.
    async fn discard_unreferenced(&self, file_name: &str) {
        let repo = PhotoRepository::new(self.db.pool());
        match repo.find_original_by_file_name(file_name).await {
            Ok(None) => {
                if let Err(e) = self.store.remove(PhotoKind::Original, file_name).await {
                    warn!("Failed to remove unreferenced original {}: {}", file_name, e);
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!("Failed to check references to {}: {}", file_name, e),
        }
    }

    /// Remove a thumbnail attached after the pair was looked up.
    async fn sweep_late_thumbnail(
        &self,
        repo: &PhotoRepository<'_>,
        original: &Photo,
    ) -> Result<()> {
        let late = repo
            .find_sibling(&original.file_name, PhotoKind::Thumbnail)
            .await
            .map_err(|e| {
                GalleryError::PartialDeletion(format!(
                    "photo {} deleted, thumbnail lookup failed: {e}",
                    original.id
                ))
            })?;

        let Some(late) = late else {
            return Ok(());
        };

        let partial = |e: GalleryError| {
            GalleryError::PartialDeletion(format!(
                "photo {} deleted, thumbnail {} left: {e}",
                original.id, late.id
            ))
        };
        self.store
            .remove(PhotoKind::Thumbnail, &late.file_name)
            .await
            .map_err(partial)?;
        repo.delete_many(&[late.id]).await.map_err(partial)?;
        Ok(())
    }
}
