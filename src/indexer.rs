//! Directory indexer - one level of the recursive walk
//!
//! A directory earns its own indexed entity in exactly two cases: it is a
//! top-level call, or it carries a `config.json` document. Otherwise its
//! media attaches to the parent entity, which keeps manifest-less nested
//! folders from fragmenting a collection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{IndexConfig, CONFIG_FILE_NAME};
use crate::db::ScanStore;
use crate::error::IndexError;
use crate::extract::{probe_image, VideoProbe};
use crate::fingerprint::{fingerprint, normalize_path, path_id};
use crate::models::{
    merge_config_payload, Derivatives, Directory, GalleryConfig, MediaItem, MediaMetadata,
    MediaStatus, ScanReport, VideoDetails, VIDEO_EXTENSION,
};
use crate::slug::{child_slug, slugify, title_from_folder};
use crate::thumbs::{relative_url, thumb_path, SMALL_WIDTH};

/// Capabilities and per-invocation state threaded through the walk.
/// No ambient globals: the store and extractor handles live here.
pub(crate) struct WalkContext<'a> {
    pub store: &'a mut ScanStore,
    pub config: &'a IndexConfig,
    pub video: &'a dyn VideoProbe,
    /// Paths already dispatched during this invocation
    pub in_flight: HashSet<PathBuf>,
}

/// Index one directory level, then recurse.
///
/// `parent` is the (id, slug) of the owning entity resolved one level up.
/// Returns Err only when this directory itself cannot be read; the caller
/// decides whether that is fatal (scan root) or a sibling-level error.
pub(crate) fn index_directory(
    ctx: &mut WalkContext<'_>,
    path: &Path,
    parent: Option<(&str, &str)>,
    report: &mut ScanReport,
) -> Result<(), IndexError> {
    let entries = std::fs::read_dir(path)
        .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?;

    let mut files: Vec<PathBuf> = Vec::new();
    let mut subdirs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    subdirs.push(entry_path);
                } else if entry_path.is_file() {
                    files.push(entry_path);
                }
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("read {}: {}", path.display(), e));
            }
        }
    }
    files.sort();
    subdirs.sort();

    let config_path = path.join(CONFIG_FILE_NAME);
    let gallery_cfg = if config_path.is_file() {
        match GalleryConfig::load(&config_path) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                report
                    .errors
                    .push(format!("config {}: {}", config_path.display(), e));
                None
            }
        }
    } else {
        None
    };

    let folder_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("gallery");
    let local_slug = slugify(folder_name);

    let (owner_id, owner_slug) = match (parent, gallery_cfg) {
        // Nested folder without a manifest: attach to the parent entity
        (Some((parent_id, parent_slug)), None) => {
            (parent_id.to_string(), parent_slug.to_string())
        }
        // Nested folder with a manifest: its own entity, hierarchical slug
        (Some((parent_id, parent_slug)), Some(cfg)) => {
            let slug = cfg
                .slug
                .clone()
                .unwrap_or_else(|| child_slug(parent_slug, &local_slug));
            resolve_directory(ctx, path, Some(parent_id), &slug, folder_name, Some(cfg), report)?
        }
        // Top-level: always an entity, with or without a manifest
        (None, cfg) => {
            let slug = cfg
                .as_ref()
                .and_then(|c| c.slug.clone())
                .unwrap_or_else(|| local_slug.clone());
            resolve_directory(ctx, path, None, &slug, folder_name, cfg, report)?
        }
    };

    let mut documents: Vec<String> = Vec::new();
    let mut position: i64 = 0;
    for file in &files {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name == CONFIG_FILE_NAME || name.starts_with('.') {
            continue;
        }
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if ctx.config.is_image_extension(&ext) {
            if let Err(e) = ingest_image(ctx, file, &owner_id, position, report) {
                report.errors.push(format!("{}: {}", file.display(), e));
            }
            position += 1;
        } else if ext == VIDEO_EXTENSION {
            if let Err(e) = ingest_video(ctx, file, &owner_id, position, report) {
                report.errors.push(format!("{}: {}", file.display(), e));
            }
            position += 1;
        } else if ctx.config.is_document_extension(&ext) {
            documents.push(name.to_string());
        }
    }

    if !documents.is_empty() {
        attach_documents(ctx, &owner_id, documents)?;
    }

    for subdir in &subdirs {
        let name = subdir.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if ctx.config.should_ignore_dir(name) {
            continue;
        }
        if let Err(e) = index_directory(ctx, subdir, Some((&owner_id, &owner_slug)), report) {
            report
                .errors
                .push(format!("directory {}: {}", subdir.display(), e));
        }
    }

    Ok(())
}

/// Create or update the directory row for this level.
/// An existing slug means merge: the config payload is shallow-merged (new
/// keys win) and recognized document fields overwrite row fields.
fn resolve_directory(
    ctx: &mut WalkContext<'_>,
    path: &Path,
    parent_id: Option<&str>,
    slug: &str,
    folder_name: &str,
    cfg: Option<GalleryConfig>,
    report: &mut ScanReport,
) -> Result<(String, String), IndexError> {
    let now = chrono::Utc::now().timestamp();
    let payload = cfg.as_ref().map(|c| c.to_payload()).unwrap_or_default();

    if let Some(mut existing) = ctx.store.get_directory_by_slug(slug)? {
        if let Some(cfg) = &cfg {
            merge_config_payload(&mut existing.config, payload);
            if let Some(title) = &cfg.title {
                existing.title = title.clone();
            }
            if let Some(description) = &cfg.description {
                existing.description = Some(description.clone());
            }
            if let Some(cover) = &cfg.cover {
                existing.cover_media_id = Some(cover.clone());
            }
            if let Some(featured) = cfg.featured {
                existing.featured = featured;
            }
            if let Some(menu_order) = cfg.menu_order {
                existing.menu_order = menu_order;
            }
            if let Some(status) = cfg.status {
                existing.status = status;
            }
            if let Some(tags) = &cfg.tags {
                existing.tags = tags.clone();
            }
            report.configs_applied += 1;
        }
        existing.parent_id = parent_id.map(str::to_string);
        existing.source_path = path.to_path_buf();
        existing.updated_at = now;
        ctx.store.update_directory(&existing)?;
        Ok((existing.id, existing.slug))
    } else {
        let id = cfg
            .as_ref()
            .and_then(|c| c.id.clone())
            .unwrap_or_else(|| path_id(path));
        let dir = Directory {
            id: id.clone(),
            title: cfg
                .as_ref()
                .and_then(|c| c.title.clone())
                .unwrap_or_else(|| title_from_folder(folder_name)),
            slug: slug.to_string(),
            description: cfg.as_ref().and_then(|c| c.description.clone()),
            cover_media_id: cfg.as_ref().and_then(|c| c.cover.clone()),
            image_count: 0,
            featured: cfg.as_ref().and_then(|c| c.featured).unwrap_or(false),
            menu_order: cfg.as_ref().and_then(|c| c.menu_order).unwrap_or(0),
            status: cfg.as_ref().and_then(|c| c.status).unwrap_or_default(),
            parent_id: parent_id.map(str::to_string),
            tags: cfg.as_ref().and_then(|c| c.tags.clone()).unwrap_or_default(),
            config: payload,
            source_path: path.to_path_buf(),
            created_at: now,
            updated_at: now,
        };
        ctx.store.insert_directory(&dir)?;
        report.directories_created += 1;
        if cfg.is_some() {
            report.configs_applied += 1;
        }
        log::debug!("Created directory '{}' ({})", dir.slug, dir.id);
        Ok((id, slug.to_string()))
    }
}

/// Merge document file names into the `documents` key of the owning
/// directory's config payload. Attached subfolders share their parent's
/// entity, so the list is a union, not an overwrite.
fn attach_documents(
    ctx: &mut WalkContext<'_>,
    directory_id: &str,
    documents: Vec<String>,
) -> Result<(), IndexError> {
    if let Some(mut dir) = ctx.store.get_directory(directory_id)? {
        let mut names: Vec<String> = dir
            .config
            .get("documents")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        for name in documents {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.sort();
        dir.config.insert(
            "documents".to_string(),
            serde_json::Value::Array(names.into_iter().map(serde_json::Value::String).collect()),
        );
        dir.updated_at = chrono::Utc::now().timestamp();
        ctx.store.update_directory(&dir)?;
    }
    Ok(())
}

/// Ingest one image file: fingerprint-skip, probe, upsert with empty
/// derivative slots (thumbnails come later)
fn ingest_image(
    ctx: &mut WalkContext<'_>,
    path: &Path,
    directory_id: &str,
    position: i64,
    report: &mut ScanReport,
) -> Result<(), IndexError> {
    if !ctx.in_flight.insert(path.to_path_buf()) {
        return Ok(());
    }
    let size = std::fs::metadata(path)
        .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?
        .len();
    let fp = fingerprint(path, size);

    if let Some(existing) = ctx.store.get_media_by_source_path(path)? {
        if existing.metadata.fingerprint == fp {
            // Unchanged content; only the attachment may have moved
            if existing.directory_id != directory_id {
                ctx.store.update_media_owner(&existing.id, directory_id)?;
            }
            return Ok(());
        }
    }

    let meta = probe_image(path)?;
    let now = chrono::Utc::now().timestamp();
    let item = MediaItem {
        id: fp.clone(),
        filename: file_name_of(path),
        title: title_for_media(path),
        directory_id: directory_id.to_string(),
        position,
        urls: Derivatives::default(),
        width: meta.width,
        height: meta.height,
        aspect_ratio: meta.aspect_ratio,
        file_size: meta.byte_size,
        format: meta.format,
        status: MediaStatus::Published,
        source_path: path.to_path_buf(),
        metadata: MediaMetadata {
            source_path: normalize_path(path),
            fingerprint: fp,
            ..Default::default()
        },
        created_at: now,
        updated_at: now,
    };
    ctx.store.upsert_media(&item)?;
    report.images_processed += 1;
    Ok(())
}

/// Ingest one video file: fingerprint-skip, probe, eager single cover
/// frame (videos get no deferred multi-size pipeline)
fn ingest_video(
    ctx: &mut WalkContext<'_>,
    path: &Path,
    directory_id: &str,
    position: i64,
    report: &mut ScanReport,
) -> Result<(), IndexError> {
    if !ctx.in_flight.insert(path.to_path_buf()) {
        return Ok(());
    }
    let size = std::fs::metadata(path)
        .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?
        .len();
    let fp = fingerprint(path, size);

    if let Some(existing) = ctx.store.get_media_by_source_path(path)? {
        if existing.metadata.fingerprint == fp {
            if existing.directory_id != directory_id {
                ctx.store.update_media_owner(&existing.id, directory_id)?;
            }
            return Ok(());
        }
    }

    let meta = ctx.video.probe(path)?;
    let mut urls = Derivatives::default();
    let mut metadata = MediaMetadata {
        source_path: normalize_path(path),
        fingerprint: fp.clone(),
        video: Some(VideoDetails {
            duration_secs: meta.duration_secs,
            codec: meta.codec.clone(),
            bitrate: meta.bitrate,
            frame_rate: meta.frame_rate,
        }),
        ..Default::default()
    };

    let cover = thumb_path(path, SMALL_WIDTH, "jpg");
    if cover.exists() {
        let url = relative_url(&ctx.config.root, &cover);
        metadata.thumbnails.insert("cover".to_string(), url.clone());
        urls.thumbnail = Some(url);
    } else {
        match ctx
            .video
            .capture_frame(path, &cover, ctx.config.cover_frame_offset)
        {
            Ok(written) => {
                let url = relative_url(&ctx.config.root, &written);
                metadata.thumbnails.insert("cover".to_string(), url.clone());
                urls.thumbnail = Some(url);
                report.thumbnails_generated += 1;
            }
            Err(e) => {
                // The row is still indexed; the cover is retried next scan
                report.errors.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    let now = chrono::Utc::now().timestamp();
    let item = MediaItem {
        id: fp.clone(),
        filename: file_name_of(path),
        title: title_for_media(path),
        directory_id: directory_id.to_string(),
        position,
        urls,
        width: meta.width,
        height: meta.height,
        aspect_ratio: meta.aspect_ratio,
        file_size: meta.byte_size,
        format: meta.format,
        status: MediaStatus::Published,
        source_path: path.to_path_buf(),
        metadata,
        created_at: now,
        updated_at: now,
    };
    ctx.store.upsert_media(&item)?;
    report.images_processed += 1;
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

fn title_for_media(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    title_from_folder(stem)
}
