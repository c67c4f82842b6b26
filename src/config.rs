//! Configuration module for the photo gallery.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{GalleryError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8181
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "tmp/photogallery.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Storage layout: one root per namespace plus the URL prefix they are served under.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding in-flight uploads.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Directory holding content-addressed originals.
    #[serde(default = "default_originals_dir")]
    pub originals_dir: PathBuf,
    /// Directory holding derived thumbnails.
    #[serde(default = "default_thumbnails_dir")]
    pub thumbnails_dir: PathBuf,
    /// URL path prefix stored files are served under.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("tmp/images/staging")
}

fn default_originals_dir() -> PathBuf {
    PathBuf::from("tmp/images/originals")
}

fn default_thumbnails_dir() -> PathBuf {
    PathBuf::from("tmp/images/thumbnails")
}

fn default_public_prefix() -> String {
    "/images".to_string()
}

fn default_max_upload_bytes() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl StorageConfig {
    /// Build a layout with all three namespaces under a single root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            staging_dir: root.join("staging"),
            originals_dir: root.join("originals"),
            thumbnails_dir: root.join("thumbnails"),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            originals_dir: default_originals_dir(),
            thumbnails_dir: default_thumbnails_dir(),
            public_prefix: default_public_prefix(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Thumbnail derivation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    /// Bounding box width.
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,
    /// Bounding box height.
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,
    /// Number of derivations allowed to run at the same time.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Number of queued jobs before uploads wait for room.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_dimension() -> u32 {
    1000
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/photogallery.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage layout.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Thumbnail configuration.
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GalleryError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GalleryError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PHOTOGALLERY_DATABASE_PATH`: Override the SQLite database path
    /// - `PHOTOGALLERY_STORAGE_ROOT`: Place all three storage namespaces under this root
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PHOTOGALLERY_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }

        if let Ok(root) = std::env::var("PHOTOGALLERY_STORAGE_ROOT") {
            if !root.is_empty() {
                let layout = StorageConfig::under(&root);
                self.storage.staging_dir = layout.staging_dir;
                self.storage.originals_dir = layout.originals_dir;
                self.storage.thumbnails_dir = layout.thumbnails_dir;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The thumbnail bounding box has a zero side
    /// - The worker count or queue capacity is zero
    /// - Two storage namespaces share a directory
    /// - The public prefix doesn't start with `/`
    pub fn validate(&self) -> Result<()> {
        if self.thumbnail.max_width == 0 || self.thumbnail.max_height == 0 {
            return Err(GalleryError::Config(
                "thumbnail bounding box must be at least 1x1".to_string(),
            ));
        }
        if self.thumbnail.workers == 0 {
            return Err(GalleryError::Config(
                "thumbnail.workers must be greater than 0".to_string(),
            ));
        }
        if self.thumbnail.queue_capacity == 0 {
            return Err(GalleryError::Config(
                "thumbnail.queue_capacity must be greater than 0".to_string(),
            ));
        }

        let s = &self.storage;
        if s.staging_dir == s.originals_dir
            || s.staging_dir == s.thumbnails_dir
            || s.originals_dir == s.thumbnails_dir
        {
            return Err(GalleryError::Config(
                "staging, originals and thumbnails directories must differ".to_string(),
            ));
        }
        if !s.public_prefix.starts_with('/') {
            return Err(GalleryError::Config(format!(
                "storage.public_prefix must start with '/': {}",
                s.public_prefix
            )));
        }
        Ok(())
    }
}
