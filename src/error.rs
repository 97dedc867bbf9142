//! Error types for the gallery indexer

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File, directory or indexed entity not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Database operation failed
    DatabaseError,
    /// Metadata extraction failed (image or video probe)
    ExtractError,
    /// Thumbnail generation failed
    ThumbnailError,
    /// Directory configuration document is invalid
    ConfigError,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred during indexing
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct IndexError {
    /// The kind of error
    pub kind: IndexErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl IndexError {
    /// Create a new index error
    pub fn new(kind: IndexErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            IndexErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create a not found error for an indexed entity (slug or id)
    pub fn entity_not_found(what: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::NotFound, None, what)
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::IoError, path, message)
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::DatabaseError, None, message)
    }

    /// Create a metadata extraction error
    pub fn extract_error(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::ExtractError, Some(path), message)
    }

    /// Create a thumbnail generation error
    pub fn thumbnail_error(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::ThumbnailError, Some(path), message)
    }

    /// Create a configuration document error
    pub fn config_error(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::ConfigError, Some(path), message)
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => IndexErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => IndexErrorKind::NotFound,
            _ => IndexErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        Self::database_error(err.to_string())
    }
}

impl From<image::ImageError> for IndexError {
    fn from(err: image::ImageError) -> Self {
        Self::new(IndexErrorKind::ExtractError, None, err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(IndexErrorKind::ConfigError, None, err.to_string())
    }
}
