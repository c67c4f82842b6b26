//! Photo record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::format::ImageFormat;

/// Whether a record describes an uploaded original or its derived thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoKind {
    /// The bytes as uploaded.
    Original,
    /// A resized copy of an original.
    Thumbnail,
}

impl PhotoKind {
    /// Convert kind to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::Original => "original",
            PhotoKind::Thumbnail => "thumbnail",
        }
    }

    /// Storage namespace directory name for this kind.
    pub fn namespace(&self) -> &'static str {
        match self {
            PhotoKind::Original => "originals",
            PhotoKind::Thumbnail => "thumbnails",
        }
    }

    /// The other half of a pair.
    pub fn sibling(&self) -> PhotoKind {
        match self {
            PhotoKind::Original => PhotoKind::Thumbnail,
            PhotoKind::Thumbnail => PhotoKind::Original,
        }
    }
}

impl fmt::Display for PhotoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PhotoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(PhotoKind::Original),
            "thumbnail" => Ok(PhotoKind::Thumbnail),
            _ => Err(format!("unknown photo kind: {s}")),
        }
    }
}

impl TryFrom<String> for PhotoKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Progress of thumbnail derivation for an original.
///
/// Thumbnail rows are always `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailStatus {
    /// Derivation is queued or running.
    Pending,
    /// The thumbnail row exists.
    Ready,
    /// Derivation failed; the original is still valid.
    Failed,
}

impl ThumbnailStatus {
    /// Convert status to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailStatus::Pending => "pending",
            ThumbnailStatus::Ready => "ready",
            ThumbnailStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ThumbnailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ThumbnailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ThumbnailStatus::Pending),
            "ready" => Ok(ThumbnailStatus::Ready),
            "failed" => Ok(ThumbnailStatus::Failed),
            _ => Err(format!("unknown thumbnail status: {s}")),
        }
    }
}

impl TryFrom<String> for ThumbnailStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Width, height and byte size of a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// A stored original or thumbnail.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Photo {
    /// Unique photo ID.
    pub id: i64,
    /// Original or thumbnail.
    #[sqlx(try_from = "String")]
    pub kind: PhotoKind,
    /// Content-derived name, shared by an original and its thumbnail.
    pub file_name: String,
    /// Public URL path of the stored bytes.
    pub location: String,
    /// Image format.
    #[sqlx(try_from = "String")]
    pub format: ImageFormat,
    /// Stored size in bytes.
    pub size_bytes: i64,
    /// Width in pixels.
    pub width: i64,
    /// Height in pixels.
    pub height: i64,
    /// Derivation progress (originals only).
    #[sqlx(try_from = "String")]
    pub status: ThumbnailStatus,
    /// When the record was created.
    pub created_at: String,
}

impl Photo {
    /// Check if this record is an original.
    pub fn is_original(&self) -> bool {
        self.kind == PhotoKind::Original
    }

    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("{}Z", self.created_at.replace(' ', "T")))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

/// Data for creating a new photo record.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    /// Original or thumbnail.
    pub kind: PhotoKind,
    /// Content-derived name.
    pub file_name: String,
    /// Public URL path.
    pub location: String,
    /// Image format.
    pub format: ImageFormat,
    /// Measured size and dimensions.
    pub dimensions: Dimensions,
    /// Initial derivation status.
    pub status: ThumbnailStatus,
}

impl NewPhoto {
    /// Describe a freshly committed original; its thumbnail is pending.
    pub fn original(
        file_name: impl Into<String>,
        location: impl Into<String>,
        format: ImageFormat,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            kind: PhotoKind::Original,
            file_name: file_name.into(),
            location: location.into(),
            format,
            dimensions,
            status: ThumbnailStatus::Pending,
        }
    }

    /// Describe a written thumbnail.
    pub fn thumbnail(
        file_name: impl Into<String>,
        location: impl Into<String>,
        format: ImageFormat,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            kind: PhotoKind::Thumbnail,
            file_name: file_name.into(),
            location: location.into(),
            format,
            dimensions,
            status: ThumbnailStatus::Ready,
        }
    }
}
