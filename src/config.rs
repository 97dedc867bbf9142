//! Configuration for the gallery indexer

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Name of the per-directory configuration document
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Directory names starting with this prefix hold generated derivative
/// assets and are never indexed as content
pub const DERIVATIVE_DIR_PREFIX: &str = "_thumb";

/// Default database file name
pub const DEFAULT_DB_FILE: &str = "gallery_index.db";

/// Default number of images encoded concurrently per thumbnail batch
pub const DEFAULT_THUMB_BATCH_SIZE: usize = 4;

/// Default frame offset for video cover capture, in seconds
pub const DEFAULT_COVER_FRAME_OFFSET: f64 = 1.0;

/// Configuration for the indexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Content root; its immediate subdirectories are the top-level
    /// indexed directories
    pub root: PathBuf,

    /// Database path for the content index
    pub db_path: Option<PathBuf>,

    /// Image file extensions (lowercase, without dot)
    pub image_extensions: HashSet<String>,

    /// Document file extensions attached to the directory config payload
    pub document_extensions: HashSet<String>,

    /// Directory names to ignore
    pub ignore_dirs: HashSet<String>,

    /// Number of images encoded concurrently per thumbnail batch
    pub thumb_batch_size: usize,

    /// Frame offset for video cover capture, in seconds
    pub cover_frame_offset: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            db_path: None,
            image_extensions: Self::default_image_extensions(),
            document_extensions: Self::default_document_extensions(),
            ignore_dirs: Self::default_ignore_dirs(),
            thumb_batch_size: DEFAULT_THUMB_BATCH_SIZE,
            cover_frame_offset: DEFAULT_COVER_FRAME_OFFSET,
        }
    }
}

impl IndexConfig {
    /// Create a new config with the given content root
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::new()
    }

    /// Get the default image extensions
    pub fn default_image_extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Get the default document extensions
    pub fn default_document_extensions() -> HashSet<String> {
        ["md", "txt"].iter().map(|s| s.to_string()).collect()
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        [
            "$RECYCLE.BIN",
            "System Volume Information",
            ".Trash",
            ".Trash-1000",
            "@eaDir",
            ".git",
            ".svn",
            "node_modules",
            "__pycache__",
            ".cache",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Check if an extension belongs to a supported image format
    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions.contains(&ext.to_lowercase())
    }

    /// Check if an extension belongs to a document file
    pub fn is_document_extension(&self, ext: &str) -> bool {
        self.document_extensions.contains(&ext.to_lowercase())
    }

    /// Check if a directory should be skipped entirely
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        // Hidden directories (starting with .)
        if name.starts_with('.') {
            return true;
        }
        // Generated derivative assets
        if name.starts_with(DERIVATIVE_DIR_PREFIX) {
            return true;
        }
        // System/control directories
        self.ignore_dirs.contains(name)
    }

    /// Get the effective database path
    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
    }
}

/// Builder for IndexConfig
#[derive(Debug, Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content root
    pub fn root(mut self, root: PathBuf) -> Self {
        self.config.root = root;
        self
    }

    /// Set the database path
    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = Some(path);
        self
    }

    /// Set the image extension whitelist
    pub fn image_extensions(mut self, extensions: HashSet<String>) -> Self {
        self.config.image_extensions = extensions;
        self
    }

    /// Set the directories to ignore
    pub fn ignore_dirs(mut self, dirs: HashSet<String>) -> Self {
        self.config.ignore_dirs = dirs;
        self
    }

    /// Add a directory to ignore
    pub fn add_ignore_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.ignore_dirs.insert(dir.into());
        self
    }

    /// Set the thumbnail batch size
    pub fn thumb_batch_size(mut self, size: usize) -> Self {
        self.config.thumb_batch_size = size.max(1);
        self
    }

    /// Set the video cover frame offset in seconds
    pub fn cover_frame_offset(mut self, offset: f64) -> Self {
        self.config.cover_frame_offset = offset;
        self
    }

    /// Build the config
    pub fn build(self) -> IndexConfig {
        self.config
    }
}
