//! Photo module for the gallery.
//!
//! This module provides the ingestion pipeline:
//! - Format validation of uploads
//! - Content-addressed storage of originals
//! - Background thumbnail derivation
//! - Metadata persistence and paired deletion

mod format;
mod repository;
mod service;
mod store;
mod thumbnail;
mod types;
mod worker;

pub use format::ImageFormat;
pub use repository::PhotoRepository;
pub use service::PhotoService;
pub use store::{ContentStore, StagedFile};
pub use thumbnail::ThumbnailDeriver;
pub use types::{Dimensions, NewPhoto, Photo, PhotoKind, ThumbnailStatus};
pub use worker::{
    channel, DerivationEvent, DerivationOutcome, ThumbnailJob, ThumbnailQueue, ThumbnailWorker,
};
