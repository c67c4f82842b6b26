//! Router configuration for the gallery API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::StorageConfig;
use crate::photo::PhotoKind;

use super::dto::HealthResponse;
use super::handlers::{
    delete_photo, get_photo, list_photos, retry_thumbnail, upload_photo, AppState,
};

/// Room for multipart boundaries and headers on top of the image itself.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the main API router, including static serving of stored images.
pub fn create_router(app_state: Arc<AppState>, storage: &StorageConfig) -> Router {
    let body_limit = usize::try_from(storage.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/photos", get(list_photos).post(upload_photo))
        .route("/photos/:id", get(get_photo).delete(delete_photo))
        .route("/photos/:id/thumbnail", post(retry_thumbnail))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .nest("/api", api_routes)
        .merge(create_static_router(storage))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Serve stored originals and thumbnails at their public locations.
pub fn create_static_router<S>(storage: &StorageConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let prefix = storage.public_prefix.trim_end_matches('/');

    Router::new()
        .nest_service(
            &format!("{}/{}", prefix, PhotoKind::Original.namespace()),
            ServeDir::new(&storage.originals_dir),
        )
        .nest_service(
            &format!("{}/{}", prefix, PhotoKind::Thumbnail.namespace()),
            ServeDir::new(&storage.thumbnails_dir),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
        // Should not panic
    }

    #[test]
    fn test_create_static_router_with_trailing_slash() {
        let mut storage = StorageConfig::default();
        storage.public_prefix = "/media/".to_string();
        let _router: Router = create_static_router(&storage);
    }
}
