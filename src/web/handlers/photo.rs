//! Photo handlers for the gallery API.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::web::dto::{ApiResponse, PhotoResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// POST /api/photos - Upload an image.
///
/// Request body: multipart/form-data with an "image" field. The field's
/// content type declares the image format.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PhotoResponse>>), ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Failed to read multipart field: {}", e);
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large("Upload is too large")
        } else {
            ApiError::bad_request("Invalid multipart data")
        }
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let media_type = field
            .content_type()
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::unsupported_media_type("Image field has no content type"))?;
        let content = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read image content: {}", e);
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large("Upload is too large")
            } else {
                ApiError::bad_request("Failed to read image")
            }
        })?;

        upload = Some((media_type, content.to_vec()));
    }

    let (media_type, content) =
        upload.ok_or_else(|| ApiError::bad_request("No image provided"))?;

    let photo = state.photos.ingest(&content, &media_type).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(photo.into()))))
}

/// GET /api/photos - List all originals and thumbnails.
pub async fn list_photos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PhotoResponse>>>, ApiError> {
    let photos = state.photos.list().await?;
    let responses = photos.into_iter().map(PhotoResponse::from).collect();
    Ok(Json(ApiResponse::new(responses)))
}

/// GET /api/photos/:id - Get a single photo.
pub async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PhotoResponse>>, ApiError> {
    let photo = state.photos.get(id).await?;
    Ok(Json(ApiResponse::new(photo.into())))
}

/// DELETE /api/photos/:id - Delete an original and its thumbnail.
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PhotoResponse>>, ApiError> {
    let photo = state.photos.delete(id).await?;
    Ok(Json(ApiResponse::new(photo.into())))
}

/// POST /api/photos/:id/thumbnail - Retry a failed thumbnail.
pub async fn retry_thumbnail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<PhotoResponse>>), ApiError> {
    let photo = state.photos.retry_thumbnail(id).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::new(photo.into()))))
}
