//! API handlers for the gallery.

pub mod photo;

pub use photo::*;

use crate::photo::PhotoService;

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Photo operations.
    pub photos: PhotoService,
}

impl AppState {
    /// Create a new application state.
    pub fn new(photos: PhotoService) -> Self {
        Self { photos }
    }
}
