//! Thumbnail derivation.
//!
//! A thumbnail is the original scaled down to fit a bounding box, encoded in
//! the original's format and stored under the original's file name.

use std::io;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::debug;

use crate::config::ThumbnailConfig;
use crate::{GalleryError, Result};

use super::format::ImageFormat;
use super::store::ContentStore;
use super::types::PhotoKind;

/// Produces bounded-size copies of stored originals.
#[derive(Debug, Clone)]
pub struct ThumbnailDeriver {
    store: ContentStore,
    max_width: u32,
    max_height: u32,
}

impl ThumbnailDeriver {
    /// Create a new ThumbnailDeriver writing into the store's thumbnail namespace.
    pub fn new(store: ContentStore, config: &ThumbnailConfig) -> Self {
        Self {
            store,
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }

    /// Bounding box as (width, height).
    pub fn bounds(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Decode `source`, scale it into the bounding box and write it as
    /// `file_name` among the thumbnails.
    ///
    /// Aspect ratio is preserved and smaller images are never upscaled. The
    /// output is written to a temporary name first so a reader never sees a
    /// half-written thumbnail.
    pub async fn derive(
        &self,
        source: &Path,
        file_name: &str,
        format: ImageFormat,
    ) -> Result<PathBuf> {
        let target = self.store.path_of(PhotoKind::Thumbnail, file_name);
        let partial = target.with_extension(format!("{}.part", format.extension()));

        let source = source.to_path_buf();
        let write_to = partial.clone();
        let (max_width, max_height) = self.bounds();

        let rendered = tokio::task::spawn_blocking(move || {
            render(&source, &write_to, format, max_width, max_height)
        })
        .await
        .map_err(|e| GalleryError::Io(io::Error::other(e)))?;

        if let Err(e) = rendered {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &target).await?;
        debug!("Derived thumbnail {:?}", target);
        Ok(target)
    }
}

fn render(
    source: &Path,
    target: &Path,
    format: ImageFormat,
    max_width: u32,
    max_height: u32,
) -> Result<()> {
    let img = image::ImageReader::open(source)?
        .with_guessed_format()?
        .decode()?;

    let img = if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    };

    let img = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg if img.color().has_alpha() => {
            image::DynamicImage::ImageRgb8(img.to_rgb8())
        }
        _ => img,
    };

    img.save_with_format(target, format.codec())?;
    Ok(())
}
