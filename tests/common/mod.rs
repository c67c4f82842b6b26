//! Common test utilities for gallery integration tests.
//!
//! Provides an isolated gallery (temporary storage root, in-memory database,
//! running thumbnail worker) and image fixtures.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::sync::broadcast;

use photogallery::config::{StorageConfig, ThumbnailConfig};
use photogallery::{Database, DerivationEvent, DerivationOutcome, ImageFormat, PhotoService};

/// How long to wait for a background derivation.
pub const DERIVATION_TIMEOUT: Duration = Duration::from_secs(60);

/// An isolated gallery backed by a temporary directory.
pub struct TestGallery {
    /// Keeps the storage root alive.
    pub temp_dir: TempDir,
    /// Shared database.
    pub db: Arc<Database>,
    /// Storage layout under `temp_dir`.
    pub storage: StorageConfig,
    /// Service with a running worker.
    pub service: PhotoService,
}

impl TestGallery {
    /// Create a gallery with default thumbnail settings.
    pub async fn new() -> Self {
        Self::with_thumbnail_config(ThumbnailConfig::default()).await
    }

    /// Create a gallery with custom thumbnail settings.
    pub async fn with_thumbnail_config(thumbnail: ThumbnailConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage = StorageConfig::under(temp_dir.path());
        let db = Arc::new(
            Database::open_in_memory()
                .await
                .expect("Failed to create test database"),
        );

        let (service, worker) = PhotoService::with_worker(db.clone(), &storage, &thumbnail)
            .expect("Failed to create photo service");
        worker.spawn();

        Self {
            temp_dir,
            db,
            storage,
            service,
        }
    }

    /// Number of files in the staging namespace.
    pub fn staging_entries(&self) -> usize {
        std::fs::read_dir(&self.storage.staging_dir)
            .expect("Failed to read staging dir")
            .count()
    }
}

/// Replace a stored file with a non-empty directory so removing it fails.
pub fn block_removal(path: &std::path::Path) {
    std::fs::remove_file(path).expect("Failed to remove stored file");
    std::fs::create_dir(path).expect("Failed to create blocking dir");
    std::fs::write(path.join("keep"), b"x").expect("Failed to fill blocking dir");
}

/// Encode a `width`x`height` image whose pixels depend on `seed`.
///
/// Different seeds give different bytes.
pub fn encode_image(width: u32, height: u32, format: ImageFormat, seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x as u8).wrapping_add(seed),
            (y as u8).wrapping_mul(3).wrapping_add(seed),
            seed,
        ])
    });

    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format.codec())
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// The content-derived file name the gallery gives these bytes.
pub fn content_file_name(content: &[u8], format: ImageFormat) -> String {
    format!("{:x}.{}", Sha256::digest(content), format.extension())
}

/// Wait for the derivation event of an original, skipping events for others.
pub async fn wait_for_derivation(
    rx: &mut broadcast::Receiver<DerivationEvent>,
    original_id: i64,
) -> DerivationOutcome {
    tokio::time::timeout(DERIVATION_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if event.original_id == original_id => return event.outcome,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event channel closed before photo {original_id} finished")
                }
            }
        }
    })
    .await
    .expect("Timed out waiting for thumbnail derivation")
}

/// Wait for a derivation and return the thumbnail ID it produced.
pub async fn wait_for_thumbnail(
    rx: &mut broadcast::Receiver<DerivationEvent>,
    original_id: i64,
) -> i64 {
    match wait_for_derivation(rx, original_id).await {
        DerivationOutcome::Ready { thumbnail_id } => thumbnail_id,
        other => panic!("derivation of photo {original_id} did not succeed: {other:?}"),
    }
}
