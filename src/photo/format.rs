//! Accepted upload formats.

use std::fmt;
use std::str::FromStr;

use crate::{GalleryError, Result};

/// Image formats the gallery accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// JPEG (`image/jpeg`).
    Jpeg,
    /// PNG (`image/png`).
    Png,
    /// GIF (`image/gif`).
    Gif,
}

impl ImageFormat {
    /// All accepted formats.
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif];

    /// Map a declared media type to an accepted format.
    ///
    /// Parameters after `;` are ignored and the comparison is case-insensitive.
    /// Anything outside `image/jpeg`, `image/png` and `image/gif` is rejected.
    pub fn from_media_type(media_type: &str) -> Result<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" => Ok(ImageFormat::Jpeg),
            "image/png" => Ok(ImageFormat::Png),
            "image/gif" => Ok(ImageFormat::Gif),
            _ => Err(GalleryError::UnsupportedFormat(media_type.to_string())),
        }
    }

    /// Canonical tag, also used as the file extension and database value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
        }
    }

    /// File extension for stored artifacts.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Canonical media type.
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
        }
    }

    /// The codec used to decode and encode this format.
    pub fn codec(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
        }
    }

    /// Check that the payload's magic bytes match the declared format.
    pub fn verify_signature(&self, content: &[u8]) -> Result<()> {
        match image::guess_format(content) {
            Ok(found) if found == self.codec() => Ok(()),
            Ok(found) => Err(GalleryError::Decode(format!(
                "declared {} but content is {:?}",
                self.media_type(),
                found
            ))),
            Err(_) => Err(GalleryError::Decode(format!(
                "content is not a valid {} image",
                self.as_str()
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "gif" => Ok(ImageFormat::Gif),
            _ => Err(format!("unknown image format: {s}")),
        }
    }
}

impl TryFrom<String> for ImageFormat {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}
