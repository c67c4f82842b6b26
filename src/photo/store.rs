//! Content-addressed file storage for the photo gallery.
//!
//! Files move through three namespaces:
//! ```text
//! {staging_dir}/     6f1c...-uuid.png     one per in-flight upload
//! {originals_dir}/   <sha256 hex>.png     committed originals
//! {thumbnails_dir}/  <sha256 hex>.png     derived thumbnails, same name
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::{GalleryError, Result};

use super::format::ImageFormat;
use super::types::{Dimensions, PhotoKind};

/// An upload written to the staging namespace.
///
/// The file is removed when this value is dropped without being committed.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Discarded staged upload {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to discard staged upload {:?}: {}", self.path, e),
        }
    }
}

/// Storage service for uploaded originals and derived thumbnails.
#[derive(Debug, Clone)]
pub struct ContentStore {
    config: StorageConfig,
}

impl ContentStore {
    /// Create a new ContentStore, creating all three namespace directories.
    pub fn new(config: StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.staging_dir)?;
        fs::create_dir_all(&config.originals_dir)?;
        fs::create_dir_all(&config.thumbnails_dir)?;

        Ok(Self { config })
    }

    /// Get the storage layout.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Write an upload to a staging file unique to this request.
    pub async fn stage(&self, content: &[u8], format: ImageFormat) -> Result<StagedFile> {
        let name = format!("{}.{}", Uuid::new_v4(), format.extension());
        let staged = StagedFile {
            path: self.config.staging_dir.join(name),
            committed: false,
        };

        tokio::fs::write(&staged.path, content).await?;
        Ok(staged)
    }

    /// Read a file fully and return its lowercase hex SHA-256 digest.
    pub async fn hash(path: &Path) -> Result<String> {
        let content = tokio::fs::read(path).await?;
        Ok(format!("{:x}", Sha256::digest(&content)))
    }

    /// Content-derived file name for a digest.
    pub fn content_name(digest: &str, format: ImageFormat) -> String {
        format!("{digest}.{}", format.extension())
    }

    /// Move a staged upload to its content-addressed place among the originals.
    ///
    /// An existing file with the same name holds the same bytes and is replaced.
    pub async fn commit(
        &self,
        mut staged: StagedFile,
        digest: &str,
        format: ImageFormat,
    ) -> Result<PathBuf> {
        let target = self.path_of(PhotoKind::Original, &Self::content_name(digest, format));

        tokio::fs::rename(&staged.path, &target).await?;
        staged.committed = true;

        debug!("Committed {:?} -> {:?}", staged.path, target);
        Ok(target)
    }

    /// Read width and height from the image header, and the size from the filesystem.
    ///
    /// Only the header is decoded.
    pub async fn inspect(path: &Path) -> Result<Dimensions> {
        let size_bytes = tokio::fs::metadata(path).await?.len();

        let header_path = path.to_path_buf();
        let (width, height) =
            tokio::task::spawn_blocking(move || image::image_dimensions(&header_path))
                .await
                .map_err(|e| GalleryError::Io(io::Error::other(e)))??;

        Ok(Dimensions {
            width,
            height,
            size_bytes,
        })
    }

    /// Filesystem path of a stored artifact.
    pub fn path_of(&self, kind: PhotoKind, file_name: &str) -> PathBuf {
        self.namespace_dir(kind).join(file_name)
    }

    /// Public URL path of a stored artifact.
    pub fn location_of(&self, kind: PhotoKind, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_prefix.trim_end_matches('/'),
            kind.namespace(),
            file_name
        )
    }

    /// Remove a stored artifact.
    ///
    /// Returns `false` if it was already gone.
    pub async fn remove(&self, kind: PhotoKind, file_name: &str) -> Result<bool> {
        let path = self.path_of(kind, file_name);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a stored artifact exists.
    pub fn exists(&self, kind: PhotoKind, file_name: &str) -> bool {
        self.path_of(kind, file_name).exists()
    }

    fn namespace_dir(&self, kind: PhotoKind) -> &Path {
        match kind {
            PhotoKind::Original => &self.config.originals_dir,
            PhotoKind::Thumbnail => &self.config.thumbnails_dir,
        }
    }
}
