//! Scan orchestrator - the three scan modes, purge, orphan cleanup and
//! directory aggregate maintenance
//!
//! The walk itself is sequential and depth-first; only the deferred
//! thumbnail phase parallelizes. One logical scan per invocation, no
//! cross-invocation locking: concurrent scans of the same directory must be
//! serialized by the caller.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::IndexConfig;
use crate::db::ScanStore;
use crate::error::IndexError;
use crate::extract::{FfmpegProbe, VideoProbe};
use crate::indexer::{index_directory, WalkContext};
use crate::models::{ScanMode, ScanReport};
use crate::thumbs;

/// Orchestrates scans against one content root.
/// Owns the store and extractor capabilities explicitly; there is no
/// ambient global state.
pub struct Scanner {
    store: ScanStore,
    config: IndexConfig,
    video: Box<dyn VideoProbe>,
}

impl Scanner {
    /// Create a scanner from explicit capabilities
    pub fn new(store: ScanStore, config: IndexConfig, video: Box<dyn VideoProbe>) -> Self {
        Self {
            store,
            config,
            video,
        }
    }

    /// Open the index database from the config and use the system
    /// ffprobe/ffmpeg binaries
    pub fn open(config: IndexConfig) -> Result<Self, IndexError> {
        let store = ScanStore::open(&config.effective_db_path())?;
        Ok(Self::new(store, config, Box::new(FfmpegProbe::new())))
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    /// Walk every top-level directory under the content root.
    /// Incremental semantics: no purge, orphaned media rows are removed
    /// after the walk.
    pub fn scan_all(&mut self) -> Result<ScanReport, IndexError> {
        let start = Instant::now();
        log::info!(
            "Scanning all top-level directories under {}",
            self.config.root.display()
        );

        let entries = std::fs::read_dir(&self.config.root)
            .map_err(|e| IndexError::io_error(Some(self.config.root.clone()), e.to_string()))?;
        let mut tops: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| IndexError::io_error(Some(self.config.root.clone()), e.to_string()))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if self.config.should_ignore_dir(name) {
                continue;
            }
            tops.push(path);
        }
        tops.sort();

        let mut report = ScanReport::new();
        {
            let mut ctx = WalkContext {
                store: &mut self.store,
                config: &self.config,
                video: self.video.as_ref(),
                in_flight: HashSet::new(),
            };
            for top in &tops {
                if let Err(e) = index_directory(&mut ctx, top, None, &mut report) {
                    report
                        .errors
                        .push(format!("directory {}: {}", top.display(), e));
                }
            }
        }

        report.orphans_removed += self.remove_orphans(None)?;
        self.finalize()?;
        report.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Scan complete: {} files, {} directories created, {} orphans, {} errors",
            report.images_processed,
            report.directories_created,
            report.orphans_removed,
            report.error_count()
        );
        Ok(report)
    }

    /// Scan one directory, addressed by filesystem path or stored slug
    pub fn scan_directory(
        &mut self,
        target: &str,
        mode: ScanMode,
    ) -> Result<ScanReport, IndexError> {
        let start = Instant::now();
        let (path, parent) = self.resolve_target(target)?;
        log::info!(
            "Scanning {} (mode: {})",
            path.display(),
            mode.as_str()
        );

        let mut report = ScanReport::new();
        if mode == ScanMode::Full {
            if let Some(dir) = self.store.get_directory_by_source_path(&path)? {
                self.purge_subtree(&dir.id)?;
            }
        }

        {
            let mut ctx = WalkContext {
                store: &mut self.store,
                config: &self.config,
                video: self.video.as_ref(),
                in_flight: HashSet::new(),
            };
            let parent_ref = parent.as_ref().map(|(id, slug)| (id.as_str(), slug.as_str()));
            index_directory(&mut ctx, &path, parent_ref, &mut report)?;
        }

        if mode == ScanMode::Incremental {
            let scope = self
                .store
                .get_directory_by_source_path(&path)?
                .map(|d| d.id);
            report.orphans_removed += self.remove_orphans(scope.as_deref())?;
        }

        self.finalize()?;
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Generate deferred thumbnails for one directory's indexed media
    pub fn generate_thumbnails_for_directory(
        &mut self,
        slug: &str,
    ) -> Result<ScanReport, IndexError> {
        thumbs::generate_for_directory(&mut self.store, &self.config, slug)
    }

    /// Resolve a path-or-slug target to a directory on disk plus the
    /// nearest indexed ancestor as parent context
    fn resolve_target(
        &self,
        target: &str,
    ) -> Result<(PathBuf, Option<(String, String)>), IndexError> {
        let as_path = Path::new(target);
        let path = if as_path.is_dir() {
            as_path.to_path_buf()
        } else if let Some(dir) = self.store.get_directory_by_slug(target)? {
            if !dir.source_path.is_dir() {
                return Err(IndexError::not_found(dir.source_path));
            }
            dir.source_path
        } else {
            return Err(IndexError::entity_not_found(format!(
                "no directory path or slug '{}'",
                target
            )));
        };
        let parent = self.find_parent_context(&path)?;
        Ok((path, parent))
    }

    /// Walk up from `path` looking for an already-indexed ancestor,
    /// stopping at the content root
    fn find_parent_context(&self, path: &Path) -> Result<Option<(String, String)>, IndexError> {
        for ancestor in path.ancestors().skip(1) {
            if ancestor == self.config.root || ancestor.as_os_str().is_empty() {
                break;
            }
            if let Some(dir) = self.store.get_directory_by_source_path(ancestor)? {
                return Ok(Some((dir.id, dir.slug)));
            }
        }
        Ok(None)
    }

    /// Purge a directory's indexed subtree: descendants depth-first
    /// (media, then their own rows), then the target's own media. The
    /// target's own row survives and is re-walked.
    fn purge_subtree(&mut self, dir_id: &str) -> Result<(), IndexError> {
        self.purge_children(dir_id)?;
        self.store.delete_media_for_directory(dir_id)?;
        Ok(())
    }

    fn purge_children(&mut self, dir_id: &str) -> Result<(), IndexError> {
        for child in self.store.children(dir_id)? {
            self.purge_children(&child.id)?;
            self.store.delete_media_for_directory(&child.id)?;
            // Children are by definition non-top-level rows
            self.store.delete_directory(&child.id)?;
        }
        Ok(())
    }

    /// Remove media rows whose source file vanished. `scope` limits the
    /// pass to one directory's subtree; None sweeps the whole index.
    fn remove_orphans(&mut self, scope: Option<&str>) -> Result<u64, IndexError> {
        let subtree: Option<HashSet<String>> = match scope {
            Some(root_id) => {
                let mut ids = HashSet::new();
                self.collect_subtree(root_id, &mut ids)?;
                Some(ids)
            }
            None => None,
        };

        let mut removed = 0u64;
        for item in self.store.all_media()? {
            if let Some(ids) = &subtree {
                if !ids.contains(&item.directory_id) {
                    continue;
                }
            }
            if !item.source_path.exists() {
                log::debug!("Removing orphan {}", item.source_path.display());
                self.store.delete_media(&item.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn collect_subtree(&self, dir_id: &str, out: &mut HashSet<String>) -> Result<(), IndexError> {
        out.insert(dir_id.to_string());
        for child in self.store.children(dir_id)? {
            self.collect_subtree(&child.id, out)?;
        }
        Ok(())
    }

    /// Post-walk aggregate maintenance, run after every mode: recompute
    /// derived image counts wholesale, then hero cover auto-detection
    fn finalize(&mut self) -> Result<(), IndexError> {
        self.store.recompute_image_counts()?;
        self.detect_hero_covers()?;
        Ok(())
    }

    /// For every directory without a cover, promote the first of its own
    /// media whose filename matches a hero pattern and whose source file
    /// still exists
    fn detect_hero_covers(&mut self) -> Result<(), IndexError> {
        for dir in self.store.all_directories()? {
            if dir.cover_media_id.is_some() {
                continue;
            }
            let media = self.store.media_for_directory(&dir.id)?;
            if let Some(hero) = media
                .iter()
                .find(|m| is_hero_filename(&m.filename, &self.config) && m.source_path.exists())
            {
                log::debug!("Hero cover for '{}': {}", dir.slug, hero.filename);
                self.store.set_cover(&dir.id, &hero.id)?;
            }
        }
        Ok(())
    }
}

/// Case-insensitive hero filename check: `hero.<ext>` or `hero-image.<ext>`
/// for any supported image extension
fn is_hero_filename(name: &str, config: &IndexConfig) -> bool {
    let lower = name.to_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, ext)) => {
            (stem == "hero" || stem == "hero-image") && config.is_image_extension(ext)
        }
        None => false,
    }
}
