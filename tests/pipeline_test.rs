//! Ingestion pipeline tests.
//!
//! End-to-end checks of upload, background thumbnailing, listing and paired
//! deletion through the photo service.

mod common;

use common::{
    block_removal, content_file_name, encode_image, wait_for_derivation, wait_for_thumbnail,
    TestGallery,
};
use photogallery::config::ThumbnailConfig;
use photogallery::{
    DerivationOutcome, GalleryError, ImageFormat, PhotoKind, PhotoRepository, ThumbnailStatus,
};

#[tokio::test]
async fn test_upload_yields_content_named_pair() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();

    for (seed, format) in ImageFormat::ALL.into_iter().enumerate() {
        let content = encode_image(80, 60, format, seed as u8);
        let media_type = format.media_type();

        let original = gallery.service.ingest(&content, media_type).await.unwrap();
        let expected_name = content_file_name(&content, format);

        assert_eq!(original.kind, PhotoKind::Original);
        assert_eq!(original.file_name, expected_name);
        assert_eq!(original.format, format);
        assert_eq!(original.size_bytes, content.len() as i64);
        assert_eq!(
            std::fs::read(gallery.storage.originals_dir.join(&expected_name)).unwrap(),
            content
        );

        let thumbnail_id = wait_for_thumbnail(&mut events, original.id).await;
        let thumbnail = gallery.service.get(thumbnail_id).await.unwrap();

        assert_eq!(thumbnail.kind, PhotoKind::Thumbnail);
        assert_eq!(thumbnail.file_name, expected_name);
        assert_eq!(thumbnail.format, format);
        assert_eq!(
            thumbnail.location,
            format!("/images/thumbnails/{expected_name}")
        );
        assert!(gallery.storage.thumbnails_dir.join(&expected_name).exists());
    }

    assert_eq!(gallery.staging_entries(), 0);
}

#[tokio::test]
async fn test_large_jpeg_is_bounded() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(2000, 1500, ImageFormat::Jpeg, 42);

    let original = gallery.service.ingest(&content, "image/jpeg").await.unwrap();

    assert_eq!(original.width, 2000);
    assert_eq!(original.height, 1500);
    assert_eq!(original.format, ImageFormat::Jpeg);
    assert!(original.file_name.ends_with(".jpg"));
    assert_eq!(original.status, ThumbnailStatus::Pending);

    let thumbnail_id = wait_for_thumbnail(&mut events, original.id).await;
    let thumbnail = gallery.service.get(thumbnail_id).await.unwrap();

    assert_eq!(thumbnail.width, 1000);
    assert_eq!(thumbnail.height, 750);
    assert_eq!(thumbnail.format, ImageFormat::Jpeg);
    assert_eq!(
        std::fs::metadata(gallery.storage.thumbnails_dir.join(&thumbnail.file_name))
            .unwrap()
            .len() as i64,
        thumbnail.size_bytes
    );
    assert_eq!(
        gallery.service.get(original.id).await.unwrap().status,
        ThumbnailStatus::Ready
    );
}

#[tokio::test]
async fn test_unsupported_media_type_creates_nothing() {
    let gallery = TestGallery::new().await;
    let content = encode_image(10, 10, ImageFormat::Png, 1);

    for media_type in ["image/bmp", "image/webp", "application/octet-stream", "text/plain"] {
        let result = gallery.service.ingest(&content, media_type).await;
        assert!(
            matches!(result, Err(GalleryError::UnsupportedFormat(_))),
            "{media_type} should be unsupported"
        );
    }

    assert!(gallery.service.list().await.unwrap().is_empty());
    assert_eq!(gallery.staging_entries(), 0);
    assert_eq!(
        std::fs::read_dir(&gallery.storage.originals_dir)
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn test_list_contains_every_upload() {
    let gallery = TestGallery::new().await;

    let mut ids = Vec::new();
    for seed in 0..5 {
        let content = encode_image(24, 24, ImageFormat::Png, seed);
        ids.push(gallery.service.ingest(&content, "image/png").await.unwrap().id);
    }

    let photos = gallery.service.list().await.unwrap();
    let originals: Vec<i64> = photos
        .iter()
        .filter(|p| p.is_original())
        .map(|p| p.id)
        .collect();

    assert!(photos.len() >= 5);
    assert_eq!(originals, ids);
}

#[tokio::test]
async fn test_delete_removes_pair() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(300, 200, ImageFormat::Png, 7);

    let original = gallery.service.ingest(&content, "image/png").await.unwrap();
    let thumbnail_id = wait_for_thumbnail(&mut events, original.id).await;

    let original_path = gallery.storage.originals_dir.join(&original.file_name);
    let thumbnail_path = gallery.storage.thumbnails_dir.join(&original.file_name);
    assert!(original_path.exists());
    assert!(thumbnail_path.exists());

    let deleted = gallery.service.delete(original.id).await.unwrap();
    assert_eq!(deleted.id, original.id);

    assert!(!original_path.exists());
    assert!(!thumbnail_path.exists());
    assert!(matches!(
        gallery.service.get(original.id).await,
        Err(GalleryError::NotFound(_))
    ));
    assert!(matches!(
        gallery.service.get(thumbnail_id).await,
        Err(GalleryError::NotFound(_))
    ));
    assert!(gallery.service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_thumbnail_changes_nothing() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(40, 30, ImageFormat::Gif, 9);

    let original = gallery.service.ingest(&content, "image/gif").await.unwrap();
    let thumbnail_id = wait_for_thumbnail(&mut events, original.id).await;
    let before = gallery.service.list().await.unwrap();

    let result = gallery.service.delete(thumbnail_id).await;

    assert!(matches!(result, Err(GalleryError::InvalidOperation(_))));
    assert_eq!(gallery.service.list().await.unwrap(), before);
    assert!(gallery
        .storage
        .originals_dir
        .join(&original.file_name)
        .exists());
    assert!(gallery
        .storage
        .thumbnails_dir
        .join(&original.file_name)
        .exists());
}

#[tokio::test]
async fn test_delete_unknown_changes_nothing() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(16, 16, ImageFormat::Png, 11);

    let original = gallery.service.ingest(&content, "image/png").await.unwrap();
    wait_for_thumbnail(&mut events, original.id).await;
    let before = gallery.service.list().await.unwrap();

    let result = gallery.service.delete(original.id + 1000).await;

    assert!(matches!(result, Err(GalleryError::NotFound(_))));
    assert_eq!(gallery.service.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_before_thumbnail_exists() {
    // One worker stuck behind a large image keeps the second job queued
    let gallery = TestGallery::with_thumbnail_config(ThumbnailConfig {
        workers: 1,
        ..Default::default()
    })
    .await;
    let mut events = gallery.service.subscribe();

    let slow = encode_image(1600, 1200, ImageFormat::Png, 20);
    let slow_original = gallery.service.ingest(&slow, "image/png").await.unwrap();
    let content = encode_image(50, 50, ImageFormat::Png, 21);
    let original = gallery.service.ingest(&content, "image/png").await.unwrap();

    gallery.service.delete(original.id).await.unwrap();

    // Jobs run in queue order with a single worker
    wait_for_thumbnail(&mut events, slow_original.id).await;
    let outcome = wait_for_derivation(&mut events, original.id).await;
    assert!(!matches!(outcome, DerivationOutcome::Ready { .. }));

    let repo = PhotoRepository::new(gallery.db.pool());
    assert!(repo
        .find_sibling(&original.file_name, PhotoKind::Thumbnail)
        .await
        .unwrap()
        .is_none());
    assert!(!gallery
        .storage
        .thumbnails_dir
        .join(&original.file_name)
        .exists());
}

#[tokio::test]
async fn test_duplicate_upload_returns_existing() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(64, 64, ImageFormat::Jpeg, 30);

    let first = gallery.service.ingest(&content, "image/jpeg").await.unwrap();
    wait_for_thumbnail(&mut events, first.id).await;

    let second = gallery.service.ingest(&content, "image/jpeg").await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, ThumbnailStatus::Ready);
    assert_eq!(gallery.service.list().await.unwrap().len(), 2);
    assert_eq!(gallery.staging_entries(), 0);
}

#[tokio::test]
async fn test_mislabeled_upload_is_rejected() {
    let gallery = TestGallery::new().await;
    let png = encode_image(20, 20, ImageFormat::Png, 40);

    let result = gallery.service.ingest(&png, "image/jpeg").await;

    assert!(matches!(result, Err(GalleryError::Decode(_))));
    assert!(gallery.service.list().await.unwrap().is_empty());
    assert_eq!(gallery.staging_entries(), 0);
}

#[tokio::test]
async fn test_reupload_after_partial_deletion_restores_files() {
    let gallery = TestGallery::new().await;
    let mut events = gallery.service.subscribe();
    let content = encode_image(120, 80, ImageFormat::Png, 50);

    let original = gallery.service.ingest(&content, "image/png").await.unwrap();
    let thumbnail_id = wait_for_thumbnail(&mut events, original.id).await;
    let original_path = gallery.storage.originals_dir.join(&original.file_name);
    let thumbnail_path = gallery.storage.thumbnails_dir.join(&original.file_name);

    block_removal(&thumbnail_path);
    let result = gallery.service.delete(original.id).await;
    assert!(matches!(result, Err(GalleryError::PartialDeletion(_))));
    assert!(!original_path.exists());
    std::fs::remove_dir_all(&thumbnail_path).unwrap();

    let again = gallery.service.ingest(&content, "image/png").await.unwrap();

    assert_eq!(again.id, original.id);
    assert_eq!(std::fs::read(&original_path).unwrap(), content);
    assert_eq!(wait_for_thumbnail(&mut events, original.id).await, thumbnail_id);
    assert!(thumbnail_path.is_file());
    assert_eq!(
        gallery.service.get(original.id).await.unwrap().status,
        ThumbnailStatus::Ready
    );

    gallery.service.delete(original.id).await.unwrap();
    assert!(gallery.service.list().await.unwrap().is_empty());
    assert!(!original_path.exists());
    assert!(!thumbnail_path.exists());
}
