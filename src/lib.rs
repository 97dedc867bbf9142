//! Hierarchical media gallery indexer with incremental scan-and-sync
//!
//! This library walks a tree of media files, turns it into a queryable
//! content index (directories, images, videos) backed by SQLite, and keeps
//! the index synchronized with filesystem changes. Thumbnail generation is
//! deferred into a separate batched phase so counts settle fast.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fingerprint;
mod indexer;
pub mod models;
pub mod scanner;
pub mod slug;
pub mod thumbs;

pub use config::{IndexConfig, IndexConfigBuilder, CONFIG_FILE_NAME};
pub use db::ScanStore;
pub use error::{IndexError, IndexErrorKind};
pub use extract::{probe_image, FfmpegProbe, ImageMeta, VideoMeta, VideoProbe};
pub use models::{
    Derivatives, Directory, DirectoryStatus, GalleryConfig, MediaFormat, MediaItem, MediaMetadata,
    MediaStatus, ScanMode, ScanReport,
};
pub use scanner::Scanner;
pub use thumbs::{PRIORITY_WIDTHS, THUMB_DIR_NAME};
