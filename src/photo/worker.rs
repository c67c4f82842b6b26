//! Background thumbnail derivation.
//!
//! Jobs are queued on a bounded channel and run by a worker that limits how
//! many derivations are in flight with a semaphore. Every finished job is
//! published as a [`DerivationEvent`].

use std::io;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ThumbnailConfig;
use crate::db::Database;
use crate::{GalleryError, Result};

use super::format::ImageFormat;
use super::repository::PhotoRepository;
use super::store::ContentStore;
use super::thumbnail::ThumbnailDeriver;
use super::types::{NewPhoto, PhotoKind, ThumbnailStatus};

/// Maximum number of events to buffer per subscriber.
const EVENT_CAPACITY: usize = 256;

/// A request to derive the thumbnail of a stored original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailJob {
    /// ID of the original row.
    pub original_id: i64,
    /// Content-derived name shared by the original and its thumbnail.
    pub file_name: String,
    /// Format of the original.
    pub format: ImageFormat,
}

/// How a derivation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationOutcome {
    /// The thumbnail row exists and the original is marked ready.
    Ready {
        /// ID of the thumbnail row.
        thumbnail_id: i64,
    },
    /// Derivation failed and the original is marked failed.
    Failed {
        /// Error description.
        error: String,
    },
    /// The original was deleted while the job ran; the output was removed.
    Discarded,
}

/// Published once per processed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationEvent {
    /// ID of the original row.
    pub original_id: i64,
    /// Content-derived name.
    pub file_name: String,
    /// Result of the job.
    pub outcome: DerivationOutcome,
}

/// Sending half of the job queue.
///
/// The worker stops once every clone has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct ThumbnailQueue {
    jobs: mpsc::Sender<ThumbnailJob>,
    events: broadcast::Sender<DerivationEvent>,
}

impl ThumbnailQueue {
    /// Queue a job, waiting for room if the queue is full.
    pub async fn enqueue(&self, job: ThumbnailJob) -> Result<()> {
        debug!(
            "Queueing thumbnail for photo {} ({})",
            job.original_id, job.file_name
        );
        self.jobs
            .send(job)
            .await
            .map_err(|_| GalleryError::Io(io::Error::other("thumbnail worker stopped")))
    }

    /// Subscribe to derivation events.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<DerivationEvent> {
        self.events.subscribe()
    }
}

/// Receiving half of the job queue, running derivations in the background.
pub struct ThumbnailWorker {
    jobs: mpsc::Receiver<ThumbnailJob>,
    processor: Arc<JobProcessor>,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

/// Create a connected queue and worker.
pub fn channel(
    db: Arc<Database>,
    store: ContentStore,
    config: &ThumbnailConfig,
) -> (ThumbnailQueue, ThumbnailWorker) {
    let (job_tx, job_rx) = mpsc::channel(config.queue_capacity.max(1));
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let workers = config.workers.max(1);

    let queue = ThumbnailQueue {
        jobs: job_tx,
        events: event_tx.clone(),
    };
    let worker = ThumbnailWorker {
        jobs: job_rx,
        processor: Arc::new(JobProcessor {
            db,
            deriver: ThumbnailDeriver::new(store.clone(), config),
            store,
            events: event_tx,
        }),
        semaphore: Arc::new(Semaphore::new(workers)),
        workers,
    };

    (queue, worker)
}

impl ThumbnailWorker {
    /// Maximum number of concurrent derivations.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run the worker loop until the queue is closed, then wait for
    /// in-flight jobs to finish.
    pub async fn run(mut self) {
        info!("Thumbnail worker started ({} workers)", self.workers);

        while let Some(job) = self.jobs.recv().await {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let processor = self.processor.clone();
            tokio::spawn(async move {
                processor.process(job).await;
                drop(permit);
            });
        }

        // Every permit is back once all spawned jobs are done
        let _ = self.semaphore.acquire_many(self.workers as u32).await;
        info!("Thumbnail worker stopped");
    }

    /// Spawn the worker loop as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

struct JobProcessor {
    db: Arc<Database>,
    store: ContentStore,
    deriver: ThumbnailDeriver,
    events: broadcast::Sender<DerivationEvent>,
}

impl JobProcessor {
    async fn process(&self, job: ThumbnailJob) {
        let outcome = match self.derive(&job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Thumbnail derivation failed for photo {} ({}): {}",
                    job.original_id, job.file_name, e
                );
                let repo = PhotoRepository::new(self.db.pool());
                if let Err(e) = repo.set_status(job.original_id, ThumbnailStatus::Failed).await {
                    warn!(
                        "Failed to mark photo {} as failed: {}",
                        job.original_id, e
                    );
                }
                DerivationOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        // No subscribers is fine
        let _ = self.events.send(DerivationEvent {
            original_id: job.original_id,
            file_name: job.file_name,
            outcome,
        });
    }

    async fn derive(&self, job: &ThumbnailJob) -> Result<DerivationOutcome> {
        let source = self.store.path_of(PhotoKind::Original, &job.file_name);
        let path = self
            .deriver
            .derive(&source, &job.file_name, job.format)
            .await?;
        let dimensions = ContentStore::inspect(&path).await?;

        let thumbnail = NewPhoto::thumbnail(
            &job.file_name,
            self.store.location_of(PhotoKind::Thumbnail, &job.file_name),
            job.format,
            dimensions,
        );

        let repo = PhotoRepository::new(self.db.pool());
        match repo.attach_thumbnail(job.original_id, &thumbnail).await? {
            Some(row) => {
                debug!(
                    "Thumbnail {} ready for photo {} ({}x{})",
                    row.id, job.original_id, row.width, row.height
                );
                Ok(DerivationOutcome::Ready {
                    thumbnail_id: row.id,
                })
            }
            None => {
                // A re-upload may already own this name again
                if repo.find_original_by_file_name(&job.file_name).await?.is_none() {
                    self.store
                        .remove(PhotoKind::Thumbnail, &job.file_name)
                        .await?;
                }
                info!(
                    "Photo {} was deleted during derivation, discarded thumbnail",
                    job.original_id
                );
                Ok(DerivationOutcome::Discarded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::config::StorageConfig;
    use crate::photo::{Dimensions, Photo};

    struct Fixture {
        _temp_dir: TempDir,
        db: Arc<Database>,
        store: ContentStore,
    }

    async fn setup() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(StorageConfig::under(temp_dir.path())).unwrap();
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        Fixture {
            _temp_dir: temp_dir,
            db,
            store,
        }
    }

    async fn store_original(fixture: &Fixture, name: &str, content: &[u8]) -> Photo {
        std::fs::write(fixture.store.path_of(PhotoKind::Original, name), content).unwrap();
        let repo = PhotoRepository::new(fixture.db.pool());
        repo.create(&NewPhoto::original(
            name,
            fixture.store.location_of(PhotoKind::Original, name),
            ImageFormat::Png,
            Dimensions {
                width: 300,
                height: 200,
                size_bytes: content.len() as u64,
            },
        ))
        .await
        .unwrap()
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 60, 30]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn job_for(photo: &Photo) -> ThumbnailJob {
        ThumbnailJob {
            original_id: photo.id,
            file_name: photo.file_name.clone(),
            format: photo.format,
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<DerivationEvent>) -> DerivationEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for derivation event")
            .unwrap()
    }

    #[tokio::test]
    async fn test_job_produces_thumbnail() {
        let fixture = setup().await;
        let config = ThumbnailConfig {
            max_width: 150,
            max_height: 150,
            ..Default::default()
        };
        let (queue, worker) = channel(fixture.db.clone(), fixture.store.clone(), &config);
        let handle = worker.spawn();
        let mut events = queue.subscribe();

        let original = store_original(&fixture, "a.png", &png_bytes(300, 200)).await;
        queue.enqueue(job_for(&original)).await.unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.original_id, original.id);
        let thumbnail_id = match event.outcome {
            DerivationOutcome::Ready { thumbnail_id } => thumbnail_id,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let repo = PhotoRepository::new(fixture.db.pool());
        let thumb = repo.get(thumbnail_id).await.unwrap();
        assert_eq!(thumb.kind, PhotoKind::Thumbnail);
        assert_eq!(thumb.file_name, "a.png");
        assert_eq!(thumb.location, "/images/thumbnails/a.png");
        assert_eq!((thumb.width, thumb.height), (150, 100));
        assert_eq!(
            repo.get(original.id).await.unwrap().status,
            ThumbnailStatus::Ready
        );
        assert!(fixture.store.exists(PhotoKind::Thumbnail, "a.png"));

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_job_marks_original() {
        let fixture = setup().await;
        let (queue, worker) =
            channel(fixture.db.clone(), fixture.store.clone(), &ThumbnailConfig::default());
        let handle = worker.spawn();
        let mut events = queue.subscribe();

        let original = store_original(&fixture, "broken.png", b"not an image at all").await;
        queue.enqueue(job_for(&original)).await.unwrap();

        let event = next_event(&mut events).await;
        assert!(matches!(event.outcome, DerivationOutcome::Failed { .. }));

        let repo = PhotoRepository::new(fixture.db.pool());
        assert_eq!(
            repo.get(original.id).await.unwrap().status,
            ThumbnailStatus::Failed
        );
        assert!(repo
            .find_sibling("broken.png", PhotoKind::Thumbnail)
            .await
            .unwrap()
            .is_none());
        assert!(!fixture.store.exists(PhotoKind::Thumbnail, "broken.png"));

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_job_for_deleted_original_is_discarded() {
        let fixture = setup().await;
        let (queue, worker) =
            channel(fixture.db.clone(), fixture.store.clone(), &ThumbnailConfig::default());
        let handle = worker.spawn();
        let mut events = queue.subscribe();

        let original = store_original(&fixture, "late.png", &png_bytes(40, 40)).await;
        let repo = PhotoRepository::new(fixture.db.pool());
        repo.delete_many(&[original.id]).await.unwrap();

        queue.enqueue(job_for(&original)).await.unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.outcome, DerivationOutcome::Discarded);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(!fixture.store.exists(PhotoKind::Thumbnail, "late.png"));

        drop(queue);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_drains_queue_before_stopping() {
        let fixture = setup().await;
        let config = ThumbnailConfig {
            workers: 1,
            queue_capacity: 8,
            ..Default::default()
        };
        let (queue, worker) = channel(fixture.db.clone(), fixture.store.clone(), &config);
        assert_eq!(worker.workers(), 1);
        let mut events = queue.subscribe();

        let mut ids = Vec::new();
        for i in 0..4 {
            let name = format!("q{i}.png");
            let original = store_original(&fixture, &name, &png_bytes(20 + i, 20)).await;
            queue.enqueue(job_for(&original)).await.unwrap();
            ids.push(original.id);
        }

        // Close the queue before the worker even starts
        drop(queue);
        tokio::time::timeout(Duration::from_secs(30), worker.run())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert!(matches!(event.outcome, DerivationOutcome::Ready { .. }));
            seen.push(event.original_id);
        }
        seen.sort();
        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped() {
        let fixture = setup().await;
        let (queue, worker) =
            channel(fixture.db.clone(), fixture.store.clone(), &ThumbnailConfig::default());
        drop(worker);

        let result = queue
            .enqueue(ThumbnailJob {
                original_id: 1,
                file_name: "x.png".to_string(),
                format: ImageFormat::Png,
            })
            .await;

        assert!(matches!(result, Err(GalleryError::Io(_))));
    }
}
