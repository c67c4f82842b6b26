use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use photogallery::{Config, Database, PhotoService, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = photogallery::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        photogallery::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> photogallery::Result<()> {
    config.validate()?;

    info!("photogallery {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let db = Arc::new(Database::open(&config.database).await?);

    let (photos, worker) =
        PhotoService::with_worker(db.clone(), &config.storage, &config.thumbnail)?;
    let worker = worker.spawn();

    let queued = photos.reconcile().await?;
    if queued > 0 {
        info!("Resuming {} unfinished thumbnail(s)", queued);
    }

    WebServer::new(&config.server, &config.storage, photos)
        .run()
        .await?;

    // The queue closes once the last service handle is gone
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Thumbnail worker panicked: {}", e),
        Err(_) => warn!(
            "Thumbnail worker did not finish within {}s; pending thumbnails resume on next start",
            timeout.as_secs()
        ),
    }

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}
