//! Response DTOs for the gallery API.

use serde::Serialize;

use crate::photo::{Photo, PhotoKind};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// A stored original or thumbnail.
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    /// Photo ID.
    pub id: i64,
    /// `original` or `thumbnail`.
    pub kind: String,
    /// Content-derived file name.
    pub file_name: String,
    /// Public URL path of the stored bytes.
    pub location: String,
    /// Image format tag.
    pub format: String,
    /// Media type of the stored bytes.
    pub media_type: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Width in pixels.
    pub width: i64,
    /// Height in pixels.
    pub height: i64,
    /// Thumbnail derivation status (originals only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_status: Option<String>,
    /// Creation time (RFC 3339).
    pub created_at: String,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        let thumbnail_status = match photo.kind {
            PhotoKind::Original => Some(photo.status.to_string()),
            PhotoKind::Thumbnail => None,
        };
        Self {
            id: photo.id,
            kind: photo.kind.to_string(),
            created_at: photo.created_at_datetime().to_rfc3339(),
            file_name: photo.file_name,
            location: photo.location,
            format: photo.format.to_string(),
            media_type: photo.format.media_type().to_string(),
            size_bytes: photo.size_bytes,
            width: photo.width,
            height: photo.height,
            thumbnail_status,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the server answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}
