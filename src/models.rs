//! Core data models for the gallery indexer

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::IndexError;

/// The single supported video extension
pub const VIDEO_EXTENSION: &str = "mp4";

/// Media format, discriminates images from videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    Tiff,
    Mp4,
}

impl MediaFormat {
    /// Infer media format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaFormat::Jpeg),
            "png" => Some(MediaFormat::Png),
            "gif" => Some(MediaFormat::Gif),
            "webp" => Some(MediaFormat::Webp),
            "bmp" => Some(MediaFormat::Bmp),
            "tiff" | "tif" => Some(MediaFormat::Tiff),
            VIDEO_EXTENSION => Some(MediaFormat::Mp4),
            _ => None,
        }
    }

    /// Infer media format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Png => "png",
            MediaFormat::Gif => "gif",
            MediaFormat::Webp => "webp",
            MediaFormat::Bmp => "bmp",
            MediaFormat::Tiff => "tiff",
            MediaFormat::Mp4 => "mp4",
        }
    }

    /// Parse from the stored string representation
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_extension(s)
    }

    /// Whether this format is a video
    pub fn is_video(&self) -> bool {
        matches!(self, MediaFormat::Mp4)
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Publication status of an indexed directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryStatus {
    #[default]
    Published,
    Draft,
    Archived,
}

impl DirectoryStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryStatus::Published => "published",
            DirectoryStatus::Draft => "draft",
            DirectoryStatus::Archived => "archived",
        }
    }

    /// Parse from the stored string, falling back to published
    pub fn parse(s: &str) -> Self {
        match s {
            "draft" => DirectoryStatus::Draft,
            "archived" => DirectoryStatus::Archived,
            _ => DirectoryStatus::Published,
        }
    }
}

/// Processing status of an indexed media row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    #[default]
    Processing,
    Published,
}

impl MediaStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Processing => "processing",
            MediaStatus::Published => "published",
        }
    }

    /// Parse from the stored string, falling back to processing
    pub fn parse(s: &str) -> Self {
        match s {
            "published" => MediaStatus::Published,
            _ => MediaStatus::Processing,
        }
    }
}

/// Scan mode selecting purge and cleanup behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Purge the indexed subtree, then re-walk from scratch
    Full,
    /// Walk without purging, then remove orphaned media rows
    #[default]
    Incremental,
    /// Walk only; no purge, no orphan cleanup
    Lightweight,
}

impl ScanMode {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Full => "full",
            ScanMode::Incremental => "incremental",
            ScanMode::Lightweight => "lightweight",
        }
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ScanMode::Full),
            "incremental" => Ok(ScanMode::Incremental),
            "lightweight" => Ok(ScanMode::Lightweight),
            other => Err(format!(
                "unknown scan mode '{}' (expected full, incremental or lightweight)",
                other
            )),
        }
    }
}

/// An indexed directory entity (collection/category), distinct from a raw
/// filesystem folder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    /// Stable id (hash of the filesystem path, or supplied by the config
    /// document)
    pub id: String,
    pub title: String,
    /// Globally unique URL-safe identifier
    pub slug: String,
    pub description: Option<String>,
    /// Cover media id, set manually or by hero auto-detection
    pub cover_media_id: Option<String>,
    /// Derived count of published media; recomputed wholesale after every
    /// scan, never trusted as input
    pub image_count: i64,
    pub featured: bool,
    pub menu_order: i64,
    pub status: DirectoryStatus,
    /// Parent directory id; None means top-level
    pub parent_id: Option<String>,
    pub tags: Vec<String>,
    /// Opaque config payload, shallow-merged on repeat indexing
    pub config: Map<String, Value>,
    /// Indexed filesystem path, used to resolve slugs back to disk
    pub source_path: PathBuf,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Derivative URL slots of a media row; each stays empty until generated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivatives {
    pub thumbnail: Option<String>,
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub original: Option<String>,
}

/// Video facts captured by the video probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub duration_secs: f64,
    pub codec: String,
    pub bitrate: u64,
    pub frame_rate: f64,
}

/// Free-form metadata blob stored with every media row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Absolute source path, normalized to forward slashes
    pub source_path: String,
    /// Change fingerprint the row was indexed under
    pub fingerprint: String,
    /// Generated derivative files keyed by width label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thumbnails: BTreeMap<String, String>,
    /// Video facts; None for images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoDetails>,
    /// Forward-compatible unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An indexed media row (image or video)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Change fingerprint; the row's primary identity
    pub id: String,
    pub filename: String,
    pub title: String,
    pub directory_id: String,
    /// File order within the owning directory walk
    pub position: i64,
    pub urls: Derivatives,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub file_size: u64,
    pub format: MediaFormat,
    pub status: MediaStatus,
    pub source_path: PathBuf,
    pub metadata: MediaMetadata,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MediaItem {
    /// Whether this row is a video
    pub fn is_video(&self) -> bool {
        self.format.is_video()
    }
}

/// Per-directory configuration document (`config.json`)
///
/// Recognized fields are typed; unknown keys are captured in `extra` so a
/// newer document survives a round trip through an older indexer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DirectoryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GalleryConfig {
    /// Load a configuration document from disk
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IndexError::config_error(path.to_path_buf(), e.to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| IndexError::config_error(path.to_path_buf(), e.to_string()))
    }

    /// Serialize the whole document into a config payload map
    pub fn to_payload(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Shallow-merge an incoming config payload into an existing one; new keys
/// win, keys absent from the incoming payload survive
pub fn merge_config_payload(existing: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

/// Aggregate result of a scan or thumbnail invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// Media files ingested or re-ingested (images and videos)
    pub images_processed: u64,
    /// Derivative files actually written
    pub thumbnails_generated: u64,
    /// Directory rows created
    pub directories_created: u64,
    /// Configuration documents applied
    pub configs_applied: u64,
    /// Media rows removed because the source file vanished
    pub orphans_removed: u64,
    /// Non-fatal errors, formatted; the walk continues past each
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<String>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl ScanReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Check if the invocation completed without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another report's counters into this one
    pub fn absorb(&mut self, other: ScanReport) {
        self.images_processed += other.images_processed;
        self.thumbnails_generated += other.thumbnails_generated;
        self.directories_created += other.directories_created;
        self.configs_applied += other.configs_applied;
        self.orphans_removed += other.orphans_removed;
        self.errors.extend(other.errors);
    }
}
