//! Change fingerprints and path-derived identities
//!
//! A media row's identity is derived from its absolute path and byte size.
//! Modification time is excluded: copies, cross-platform timestamp drift and
//! touch operations must never classify a file as changed.

use md5::{Digest, Md5};
use std::path::Path;

use crate::error::IndexError;

/// Normalize a path to a stable string form (forward slashes)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compute the change fingerprint for a file from its path and size
pub fn fingerprint(path: &Path, size: u64) -> String {
    let mut hasher = Md5::new();
    hasher.update(normalize_path(path).as_bytes());
    hasher.update(b":");
    hasher.update(size.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the change fingerprint for a file on disk
pub fn file_fingerprint(path: &Path) -> Result<String, IndexError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?;
    Ok(fingerprint(path, metadata.len()))
}

/// Derive a stable directory id from a filesystem path
pub fn path_id(path: &Path) -> String {
    let mut hasher = Md5::new();
    hasher.update(normalize_path(path).as_bytes());
    format!("{:x}", hasher.finalize())
}
