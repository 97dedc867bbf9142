//! Deferred thumbnail pipeline
//!
//! Scans leave every derivative slot empty so counts settle fast; this
//! module fills them later, batch by batch. A batch runs in parallel,
//! batches run strictly one after another, capping peak encode work no
//! matter how large the directory is.
//!
//! Derivatives land beside the source in `_thumbs/`, named
//! `<stem>_<width>w.webp` (video cover frames use `.jpg`). The serving
//! layer parses these names back; the convention must not change.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::IndexConfig;
use crate::db::ScanStore;
use crate::error::IndexError;
use crate::models::{Derivatives, MediaItem, MediaMetadata, ScanReport};

/// Subdirectory receiving generated derivatives, written beside the source
pub const THUMB_DIR_NAME: &str = "_thumbs";

pub const LARGE_WIDTH: u32 = 1600;
pub const MEDIUM_WIDTH: u32 = 800;
pub const SMALL_WIDTH: u32 = 400;

/// The fixed priority widths, generated large first
pub const PRIORITY_WIDTHS: [u32; 3] = [LARGE_WIDTH, MEDIUM_WIDTH, SMALL_WIDTH];

const WEBP_QUALITY: f32 = 80.0;

/// Expected output path for a derivative of `source` at `width`
pub fn thumb_path(source: &Path, width: u32, ext: &str) -> PathBuf {
    let dir = source
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(THUMB_DIR_NAME);
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("media");
    dir.join(format!("{}_{}w.{}", stem, width, ext))
}

/// URL form of a path: relative to the content root, forward slashes
pub fn relative_url(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Generate derivatives for every published media row of a directory
pub fn generate_for_directory(
    store: &mut ScanStore,
    config: &IndexConfig,
    slug: &str,
) -> Result<ScanReport, IndexError> {
    let start = Instant::now();
    let dir = store
        .get_directory_by_slug(slug)?
        .ok_or_else(|| IndexError::entity_not_found(format!("directory '{}' not indexed", slug)))?;
    let items = store.media_for_directory(&dir.id)?;
    log::info!(
        "Generating thumbnails for '{}' ({} media rows)",
        slug,
        items.len()
    );

    let mut report = ScanReport::new();
    for batch in items.chunks(config.thumb_batch_size.max(1)) {
        // Encode the whole batch in parallel, then settle it in the store
        // before the next batch starts
        let outcomes: Vec<_> = batch
            .par_iter()
            .map(|item| {
                (
                    item.id.clone(),
                    item.source_path.clone(),
                    generate_for_item(config, item),
                )
            })
            .collect();

        for (id, source_path, outcome) in outcomes {
            match outcome {
                Ok(Some(done)) => {
                    report.thumbnails_generated += done.generated;
                    if let Err(e) = store.update_media_derivatives(&id, &done.urls, &done.metadata)
                    {
                        report
                            .errors
                            .push(format!("thumbnail update {}: {}", source_path.display(), e));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    report
                        .errors
                        .push(format!("thumbnail {}: {}", source_path.display(), e));
                }
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    Ok(report)
}

struct ThumbOutcome {
    urls: Derivatives,
    metadata: MediaMetadata,
    /// Derivative files actually written (skips excluded)
    generated: u64,
}

/// Generate the priority widths for one image. Returns None for videos
/// (their cover frame is captured eagerly at ingest time).
fn generate_for_item(
    config: &IndexConfig,
    item: &MediaItem,
) -> Result<Option<ThumbOutcome>, IndexError> {
    if item.is_video() {
        return Ok(None);
    }
    let source = item.source_path.as_path();
    if !source.exists() {
        return Err(IndexError::thumbnail_error(
            source.to_path_buf(),
            "source file missing",
        ));
    }

    let mut urls = item.urls.clone();
    let mut metadata = item.metadata.clone();
    let mut generated = 0u64;
    let mut decoded: Option<DynamicImage> = None;

    for width in PRIORITY_WIDTHS {
        // Never upscale: a source narrower than the target width is skipped
        if item.width < width {
            continue;
        }
        let out = thumb_path(source, width, "webp");
        if !out.exists() {
            if decoded.is_none() {
                decoded = Some(
                    image::open(source)
                        .map_err(|e| IndexError::thumbnail_error(source.to_path_buf(), e.to_string()))?,
                );
            }
            let img = decoded.as_ref().unwrap();
            write_webp(img, width, &out)?;
            generated += 1;
        }

        let url = relative_url(&config.root, &out);
        metadata.thumbnails.insert(width.to_string(), url.clone());
        match width {
            LARGE_WIDTH => urls.large = Some(url),
            MEDIUM_WIDTH => urls.medium = Some(url),
            SMALL_WIDTH => {
                urls.small = Some(url.clone());
                urls.thumbnail = Some(url);
            }
            _ => {}
        }
    }

    if urls.original.is_none() {
        urls.original = Some(relative_url(&config.root, source));
    }

    Ok(Some(ThumbOutcome {
        urls,
        metadata,
        generated,
    }))
}

/// Resize to the target width (aspect preserved) and write a WebP file
fn write_webp(img: &DynamicImage, target_width: u32, out: &Path) -> Result<(), IndexError> {
    let (w, h) = img.dimensions();
    let target_height = ((target_width as f64 / w as f64) * h as f64)
        .round()
        .max(1.0) as u32;
    let resized = img.resize_exact(target_width, target_height, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();
    let encoded = webp::Encoder::from_rgb(rgb.as_raw(), target_width, target_height)
        .encode(WEBP_QUALITY);

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| IndexError::io_error(Some(parent.to_path_buf()), e.to_string()))?;
    }
    std::fs::write(out, &*encoded)
        .map_err(|e| IndexError::thumbnail_error(out.to_path_buf(), e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Directory, DirectoryStatus, MediaFormat, MediaStatus};

    #[test]
    fn test_thumb_path_naming() {
        assert_eq!(
            thumb_path(Path::new("/g/travel/beach.jpg"), 400, "webp"),
            PathBuf::from("/g/travel/_thumbs/beach_400w.webp")
        );
        assert_eq!(
            thumb_path(Path::new("/g/travel/clip.mp4"), 400, "jpg"),
            PathBuf::from("/g/travel/_thumbs/clip_400w.jpg")
        );
    }

    #[test]
    fn test_relative_url() {
        let root = Path::new("/galleries");
        assert_eq!(
            relative_url(root, Path::new("/galleries/travel/a.jpg")),
            "travel/a.jpg"
        );
        // Paths outside the root fall back to the full path
        assert_eq!(relative_url(root, Path::new("/elsewhere/b.jpg")), "/elsewhere/b.jpg");
    }

    fn directory_row(id: &str, slug: &str, path: &Path) -> Directory {
        Directory {
            id: id.to_string(),
            title: slug.to_string(),
            slug: slug.to_string(),
            description: None,
            cover_media_id: None,
            image_count: 0,
            featured: false,
            menu_order: 0,
            status: DirectoryStatus::Published,
            parent_id: None,
            tags: Vec::new(),
            config: serde_json::Map::new(),
            source_path: path.to_path_buf(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn media_row(id: &str, dir_id: &str, path: &Path, width: u32, height: u32) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            filename: path.file_name().unwrap().to_string_lossy().to_string(),
            title: String::new(),
            directory_id: dir_id.to_string(),
            position: 0,
            urls: Derivatives::default(),
            width,
            height,
            aspect_ratio: width as f64 / height as f64,
            file_size: 1,
            format: MediaFormat::Png,
            status: MediaStatus::Published,
            source_path: path.to_path_buf(),
            metadata: MediaMetadata {
                source_path: path.to_string_lossy().to_string(),
                fingerprint: id.to_string(),
                ..Default::default()
            },
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_generate_skips_widths_wider_than_source() {
        let tmp = tempfile::tempdir().unwrap();
        let dir_path = tmp.path().join("gallery");
        std::fs::create_dir_all(&dir_path).unwrap();
        let img_path = dir_path.join("photo.png");
        image::RgbImage::new(500, 300).save(&img_path).unwrap();

        let mut store = ScanStore::open_memory().unwrap();
        store
            .insert_directory(&directory_row("d1", "gallery", &dir_path))
            .unwrap();
        store
            .upsert_media(&media_row("fp1", "d1", &img_path, 500, 300))
            .unwrap();

        let config = IndexConfig::new(tmp.path().to_path_buf());
        let report = generate_for_directory(&mut store, &config, "gallery").unwrap();

        // 500px source: only the 400w derivative is generated
        assert_eq!(report.thumbnails_generated, 1);
        assert!(report.is_success());
        assert!(dir_path.join("_thumbs/photo_400w.webp").exists());
        assert!(!dir_path.join("_thumbs/photo_800w.webp").exists());

        let row = store.get_media("fp1").unwrap().unwrap();
        assert!(row.urls.small.is_some());
        assert_eq!(row.urls.thumbnail, row.urls.small);
        assert!(row.urls.medium.is_none());
        assert!(row.urls.large.is_none());
        assert_eq!(row.urls.original.as_deref(), Some("gallery/photo.png"));
        assert_eq!(row.metadata.thumbnails.len(), 1);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir_path = tmp.path().join("gallery");
        std::fs::create_dir_all(&dir_path).unwrap();
        let img_path = dir_path.join("photo.png");
        image::RgbImage::new(900, 600).save(&img_path).unwrap();

        let mut store = ScanStore::open_memory().unwrap();
        store
            .insert_directory(&directory_row("d1", "gallery", &dir_path))
            .unwrap();
        store
            .upsert_media(&media_row("fp1", "d1", &img_path, 900, 600))
            .unwrap();

        let config = IndexConfig::new(tmp.path().to_path_buf());
        let first = generate_for_directory(&mut store, &config, "gallery").unwrap();
        assert_eq!(first.thumbnails_generated, 2); // 800w + 400w

        let second = generate_for_directory(&mut store, &config, "gallery").unwrap();
        assert_eq!(second.thumbnails_generated, 0);
        // Slots are still filled on the re-run
        let row = store.get_media("fp1").unwrap().unwrap();
        assert!(row.urls.medium.is_some());
        assert!(row.urls.small.is_some());
    }

    #[test]
    fn test_generate_skips_videos() {
        let tmp = tempfile::tempdir().unwrap();
        let dir_path = tmp.path().join("gallery");
        std::fs::create_dir_all(&dir_path).unwrap();
        let clip_path = dir_path.join("clip.mp4");
        std::fs::write(&clip_path, b"not really a video").unwrap();

        let mut store = ScanStore::open_memory().unwrap();
        store
            .insert_directory(&directory_row("d1", "gallery", &dir_path))
            .unwrap();
        let mut row = media_row("fp1", "d1", &clip_path, 1920, 1080);
        row.format = MediaFormat::Mp4;
        store.upsert_media(&row).unwrap();

        let config = IndexConfig::new(tmp.path().to_path_buf());
        let report = generate_for_directory(&mut store, &config, "gallery").unwrap();
        assert_eq!(report.thumbnails_generated, 0);
        assert!(report.is_success());
    }

    #[test]
    fn test_missing_source_is_per_image_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir_path = tmp.path().join("gallery");
        std::fs::create_dir_all(&dir_path).unwrap();

        let mut store = ScanStore::open_memory().unwrap();
        store
            .insert_directory(&directory_row("d1", "gallery", &dir_path))
            .unwrap();
        store
            .upsert_media(&media_row(
                "fp1",
                "d1",
                &dir_path.join("gone.png"),
                800,
                600,
            ))
            .unwrap();

        let config = IndexConfig::new(tmp.path().to_path_buf());
        let report = generate_for_directory(&mut store, &config, "gallery").unwrap();
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.thumbnails_generated, 0);
    }

    #[test]
    fn test_unknown_slug_is_fatal() {
        let mut store = ScanStore::open_memory().unwrap();
        let config = IndexConfig::default();
        assert!(generate_for_directory(&mut store, &config, "missing").is_err());
    }
}
