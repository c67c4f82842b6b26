//! Web API module for the gallery.
//!
//! This module provides the HTTP surface over the photo service: upload,
//! listing, lookup and deletion under `/api/photos`, plus static serving of
//! stored originals and thumbnails.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
