//! photogallery - content-addressed image storage with background thumbnailing.
//!
//! Uploaded images are validated, stored under the SHA-256 of their bytes and
//! recorded in SQLite. A bounded worker pool derives a thumbnail for each
//! original; an original and its thumbnail are listed and deleted as a pair.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod photo;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{GalleryError, Result};
pub use photo::{
    ContentStore, DerivationEvent, DerivationOutcome, ImageFormat, Photo, PhotoKind,
    PhotoRepository, PhotoService, ThumbnailStatus,
};
pub use web::WebServer;
