//! End-to-end scan flow: index a gallery tree, sync it through filesystem
//! changes, then run the deferred thumbnail phase.

use std::path::{Path, PathBuf};

use gallery_indexer::{
    IndexConfig, IndexError, MediaFormat, ScanMode, ScanStore, Scanner, VideoMeta, VideoProbe,
};

struct StubProbe;

impl VideoProbe for StubProbe {
    fn probe(&self, path: &Path) -> Result<VideoMeta, IndexError> {
        let byte_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Ok(VideoMeta {
            width: 1920,
            height: 1080,
            format: MediaFormat::Mp4,
            byte_size,
            aspect_ratio: 1920.0 / 1080.0,
            duration_secs: 30.0,
            codec: "h264".to_string(),
            bitrate: 6_000_000,
            frame_rate: 24.0,
        })
    }

    fn capture_frame(
        &self,
        _source: &Path,
        output: &Path,
        _offset_secs: f64,
    ) -> Result<PathBuf, IndexError> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(output, b"jpeg").unwrap();
        Ok(output.to_path_buf())
    }
}

fn write_image(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::new(width, height).save(path).unwrap();
}

fn scanner_for(root: &Path) -> Scanner {
    Scanner::new(
        ScanStore::open_memory().unwrap(),
        IndexConfig::new(root.to_path_buf()),
        Box::new(StubProbe),
    )
}

#[test]
fn full_gallery_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();

    // Gallery/Event/photo.jpg with no manifest in Event
    let gallery = root.join("Gallery");
    write_image(&gallery.join("hero.jpg"), 600, 400);
    write_image(&gallery.join("Event").join("photo.jpg"), 500, 300);
    std::fs::write(gallery.join("about.md"), "# About this gallery").unwrap();

    let mut scanner = scanner_for(root);
    let report = scanner.scan_all().unwrap();

    assert!(report.is_success());
    assert_eq!(report.directories_created, 1);
    assert_eq!(report.images_processed, 2);

    // Attachment: the manifest-less Event folder folded into Gallery
    let gallery_row = scanner
        .store()
        .get_directory_by_slug("gallery")
        .unwrap()
        .unwrap();
    assert_eq!(gallery_row.image_count, 2);
    let photo = scanner
        .store()
        .get_media_by_source_path(&gallery.join("Event/photo.jpg"))
        .unwrap()
        .unwrap();
    assert_eq!(photo.directory_id, gallery_row.id);

    // Hero auto-detection picked hero.jpg as cover
    let hero = scanner
        .store()
        .get_media_by_source_path(&gallery.join("hero.jpg"))
        .unwrap()
        .unwrap();
    assert_eq!(gallery_row.cover_media_id.as_deref(), Some(hero.id.as_str()));

    // Documents landed in the config payload, not as media rows
    assert_eq!(
        gallery_row.config["documents"],
        serde_json::json!(["about.md"])
    );

    // Rescan without changes: a no-op
    let rescan = scanner.scan_all().unwrap();
    assert_eq!(rescan.images_processed, 0);
    assert_eq!(rescan.directories_created, 0);
    assert_eq!(rescan.orphans_removed, 0);

    // Event gains a manifest: new hierarchical entity, media re-pointed
    std::fs::write(gallery.join("Event/config.json"), r#"{"title": "The Event"}"#).unwrap();
    let report = scanner.scan_all().unwrap();
    assert_eq!(report.directories_created, 1);
    assert_eq!(report.configs_applied, 1);
    assert_eq!(report.images_processed, 0);

    let event_row = scanner
        .store()
        .get_directory_by_slug("gallery-event")
        .unwrap()
        .unwrap();
    assert_eq!(event_row.title, "The Event");
    assert_eq!(
        event_row.parent_id.as_deref(),
        Some(gallery_row.id.as_str())
    );
    let photo = scanner
        .store()
        .get_media_by_source_path(&gallery.join("Event/photo.jpg"))
        .unwrap()
        .unwrap();
    assert_eq!(photo.directory_id, event_row.id);

    // Counts follow the attachment change
    let gallery_row = scanner
        .store()
        .get_directory_by_slug("gallery")
        .unwrap()
        .unwrap();
    assert_eq!(gallery_row.image_count, 1);
    assert_eq!(
        scanner
            .store()
            .get_directory_by_slug("gallery-event")
            .unwrap()
            .unwrap()
            .image_count,
        1
    );

    // Deferred thumbnails for the event directory
    let thumbs = scanner
        .generate_thumbnails_for_directory("gallery-event")
        .unwrap();
    assert_eq!(thumbs.thumbnails_generated, 1); // 500px source: 400w only
    assert!(gallery
        .join("Event/_thumbs/photo_400w.webp")
        .exists());
    let photo = scanner
        .store()
        .get_media_by_source_path(&gallery.join("Event/photo.jpg"))
        .unwrap()
        .unwrap();
    assert!(photo.urls.small.is_some());
    assert!(photo.urls.original.is_some());

    // Delete the photo: exactly one orphan removed on incremental rescan
    std::fs::remove_file(gallery.join("Event/photo.jpg")).unwrap();
    let report = scanner.scan_all().unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(
        scanner
            .store()
            .get_directory_by_slug("gallery-event")
            .unwrap()
            .unwrap()
            .image_count,
        0
    );
}

#[test]
fn full_mode_rebuilds_subtree() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let gallery = root.join("portfolio");
    write_image(&gallery.join("a.jpg"), 64, 48);
    write_image(&gallery.join("series/b.jpg"), 64, 48);
    std::fs::write(gallery.join("series/config.json"), "{}").unwrap();

    let mut scanner = scanner_for(root);
    scanner
        .scan_directory(gallery.to_str().unwrap(), ScanMode::Full)
        .unwrap();
    assert_eq!(scanner.store().media_count().unwrap(), 2);
    assert_eq!(scanner.store().directory_count().unwrap(), 2);

    // Full mode again: purge children-before-parents, rebuild cleanly
    let report = scanner
        .scan_directory(gallery.to_str().unwrap(), ScanMode::Full)
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.images_processed, 2);
    assert_eq!(scanner.store().media_count().unwrap(), 2);
    assert_eq!(scanner.store().directory_count().unwrap(), 2);
}

#[test]
fn video_ingestion_with_eager_cover() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    let gallery = root.join("clips");
    std::fs::create_dir_all(&gallery).unwrap();
    std::fs::write(gallery.join("intro.mp4"), b"fake mp4 payload").unwrap();

    let mut scanner = scanner_for(root);
    let report = scanner.scan_all().unwrap();

    assert_eq!(report.images_processed, 1);
    assert_eq!(report.thumbnails_generated, 1);
    assert!(gallery.join("_thumbs/intro_400w.jpg").exists());

    let clip = scanner
        .store()
        .get_media_by_source_path(&gallery.join("intro.mp4"))
        .unwrap()
        .unwrap();
    assert_eq!(clip.format, MediaFormat::Mp4);
    assert!(clip.urls.thumbnail.is_some());
    let details = clip.metadata.video.unwrap();
    assert_eq!(details.codec, "h264");
    assert_eq!(details.bitrate, 6_000_000);
}
