//! Error types for the photo gallery.

use thiserror::Error;

/// Common error type for the photo gallery.
#[derive(Error, Debug)]
pub enum GalleryError {
    /// The declared media type is not one of the accepted image formats.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// I/O error while staging, committing, reading or removing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored bytes could not be decoded as an image.
    #[error("decode error: {0}")]
    Decode(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested operation is not allowed on this resource.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A deletion removed some files or rows but not all of them.
    ///
    /// The message names what is left behind so the pair can be cleaned up by hand.
    #[error("partial deletion: {0}")]
    PartialDeletion(String),

    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for GalleryError {
    fn from(e: sqlx::Error) -> Self {
        GalleryError::Database(e.to_string())
    }
}

impl From<image::ImageError> for GalleryError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => GalleryError::Io(io),
            other => GalleryError::Decode(other.to_string()),
        }
    }
}

/// Result type alias for photo gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;
