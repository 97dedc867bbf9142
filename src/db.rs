//! Database module for the persistent content index
//!
//! Directories and media live in two tables keyed by stable ids; tags,
//! config payloads and media metadata are JSON text columns. Each upsert is
//! its own transaction; the core treats the store as transactionally opaque.

use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::path::{Path, PathBuf};

use crate::error::IndexError;
use crate::fingerprint::normalize_path;
use crate::models::{
    Derivatives, Directory, DirectoryStatus, MediaFormat, MediaItem, MediaMetadata, MediaStatus,
};

const DIR_COLUMNS: &str = "id, title, slug, description, cover_media_id, image_count, featured, \
     menu_order, status, parent_id, tags, config, source_path, created_at, updated_at";

const MEDIA_COLUMNS: &str = "id, filename, title, directory_id, position, url_thumbnail, \
     url_small, url_medium, url_large, url_original, width, height, aspect_ratio, file_size, \
     format, status, source_path, metadata, created_at, updated_at";

/// Store for the content index
pub struct ScanStore {
    conn: Connection,
}

impl ScanStore {
    /// Open or create the index database
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS directories (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT,
                cover_media_id TEXT,
                image_count INTEGER NOT NULL DEFAULT 0,
                featured INTEGER NOT NULL DEFAULT 0,
                menu_order INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'published',
                parent_id TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                config TEXT NOT NULL DEFAULT '{}',
                source_path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_directories_parent ON directories(parent_id);
            CREATE INDEX IF NOT EXISTS idx_directories_source_path ON directories(source_path);

            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                title TEXT NOT NULL,
                directory_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                url_thumbnail TEXT,
                url_small TEXT,
                url_medium TEXT,
                url_large TEXT,
                url_original TEXT,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                aspect_ratio REAL NOT NULL,
                file_size INTEGER NOT NULL,
                format TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                source_path TEXT NOT NULL UNIQUE,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_media_directory ON media(directory_id);
            CREATE INDEX IF NOT EXISTS idx_media_status ON media(status);
            ",
        )?;
        Ok(())
    }

    // --- directories ---

    /// Insert a new directory row
    pub fn insert_directory(&mut self, dir: &Directory) -> Result<(), IndexError> {
        self.conn.execute(
            &format!(
                "INSERT INTO directories ({DIR_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                dir.id,
                dir.title,
                dir.slug,
                dir.description,
                dir.cover_media_id,
                dir.image_count,
                dir.featured as i64,
                dir.menu_order,
                dir.status.as_str(),
                dir.parent_id,
                json_text(&dir.tags),
                json_text(&dir.config),
                normalize_path(&dir.source_path),
                dir.created_at,
                dir.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing directory row in full
    pub fn update_directory(&mut self, dir: &Directory) -> Result<(), IndexError> {
        self.conn.execute(
            "UPDATE directories SET title = ?2, slug = ?3, description = ?4,
                 cover_media_id = ?5, image_count = ?6, featured = ?7, menu_order = ?8,
                 status = ?9, parent_id = ?10, tags = ?11, config = ?12,
                 source_path = ?13, updated_at = ?14
             WHERE id = ?1",
            params![
                dir.id,
                dir.title,
                dir.slug,
                dir.description,
                dir.cover_media_id,
                dir.image_count,
                dir.featured as i64,
                dir.menu_order,
                dir.status.as_str(),
                dir.parent_id,
                json_text(&dir.tags),
                json_text(&dir.config),
                normalize_path(&dir.source_path),
                dir.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a directory by id
    pub fn get_directory(&self, id: &str) -> Result<Option<Directory>, IndexError> {
        self.query_directory("id = ?1", params![id])
    }

    /// Get a directory by its unique slug
    pub fn get_directory_by_slug(&self, slug: &str) -> Result<Option<Directory>, IndexError> {
        self.query_directory("slug = ?1", params![slug])
    }

    /// Get a directory by its indexed source path
    pub fn get_directory_by_source_path(
        &self,
        path: &Path,
    ) -> Result<Option<Directory>, IndexError> {
        self.query_directory("source_path = ?1", params![normalize_path(path)])
    }

    fn query_directory(
        &self,
        filter: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<Directory>, IndexError> {
        let sql = format!("SELECT {DIR_COLUMNS} FROM directories WHERE {filter}");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(args, row_to_directory)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all children of a directory
    pub fn children(&self, parent_id: &str) -> Result<Vec<Directory>, IndexError> {
        let sql = format!(
            "SELECT {DIR_COLUMNS} FROM directories WHERE parent_id = ?1 ORDER BY menu_order, slug"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![parent_id], row_to_directory)?;
        let mut dirs = Vec::new();
        for row in rows {
            dirs.push(row?);
        }
        Ok(dirs)
    }

    /// Get every directory row
    pub fn all_directories(&self) -> Result<Vec<Directory>, IndexError> {
        let sql = format!("SELECT {DIR_COLUMNS} FROM directories ORDER BY slug");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_directory)?;
        let mut dirs = Vec::new();
        for row in rows {
            dirs.push(row?);
        }
        Ok(dirs)
    }

    /// Delete a directory row
    pub fn delete_directory(&mut self, id: &str) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM directories WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Set a directory's cover media reference
    pub fn set_cover(&mut self, id: &str, media_id: &str) -> Result<(), IndexError> {
        self.conn.execute(
            "UPDATE directories SET cover_media_id = ?2 WHERE id = ?1",
            params![id, media_id],
        )?;
        Ok(())
    }

    /// Recompute every directory's image count from actual published media.
    /// Counts are a derived view; they are never incremented ad hoc.
    pub fn recompute_image_counts(&mut self) -> Result<(), IndexError> {
        self.conn.execute(
            "UPDATE directories SET image_count = (
                 SELECT COUNT(*) FROM media
                 WHERE media.directory_id = directories.id
                   AND media.status = 'published'
             )",
            [],
        )?;
        Ok(())
    }

    /// Get directory row count
    pub fn directory_count(&self) -> Result<u64, IndexError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM directories", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // --- media ---

    /// Get a media row by id
    pub fn get_media(&self, id: &str) -> Result<Option<MediaItem>, IndexError> {
        self.query_media("id = ?1", params![id])
    }

    /// Get a media row by its stored source path
    pub fn get_media_by_source_path(&self, path: &Path) -> Result<Option<MediaItem>, IndexError> {
        self.query_media("source_path = ?1", params![normalize_path(path)])
    }

    fn query_media(
        &self,
        filter: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<MediaItem>, IndexError> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE {filter}");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(args, row_to_media)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a media row keyed by source path.
    /// A fingerprint change means a new id: the stale row for the same
    /// source path is removed in the same transaction and the original
    /// creation time is carried over.
    pub fn upsert_media(&mut self, item: &MediaItem) -> Result<(), IndexError> {
        let source_path = normalize_path(&item.source_path);
        let tx = self.conn.transaction()?;
        let existing: Option<(String, i64)> = tx
            .query_row(
                "SELECT id, created_at FROM media WHERE source_path = ?1",
                params![source_path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let created_at = match &existing {
            Some((old_id, created)) => {
                if *old_id != item.id {
                    tx.execute("DELETE FROM media WHERE id = ?1", params![old_id])?;
                }
                *created
            }
            None => item.created_at,
        };

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO media ({MEDIA_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                item.id,
                item.filename,
                item.title,
                item.directory_id,
                item.position,
                item.urls.thumbnail,
                item.urls.small,
                item.urls.medium,
                item.urls.large,
                item.urls.original,
                item.width,
                item.height,
                item.aspect_ratio,
                item.file_size as i64,
                item.format.as_str(),
                item.status.as_str(),
                source_path,
                json_text(&item.metadata),
                created_at,
                item.updated_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Reassign a media row to another directory without touching anything else
    pub fn update_media_owner(&mut self, id: &str, directory_id: &str) -> Result<(), IndexError> {
        self.conn.execute(
            "UPDATE media SET directory_id = ?2 WHERE id = ?1",
            params![id, directory_id],
        )?;
        Ok(())
    }

    /// Update a media row's derivative URL slots and metadata in a single write
    pub fn update_media_derivatives(
        &mut self,
        id: &str,
        urls: &Derivatives,
        metadata: &MediaMetadata,
    ) -> Result<(), IndexError> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "UPDATE media SET url_thumbnail = ?2, url_small = ?3, url_medium = ?4,
                 url_large = ?5, url_original = ?6, metadata = ?7,
                 status = 'published', updated_at = ?8
             WHERE id = ?1",
            params![
                id,
                urls.thumbnail,
                urls.small,
                urls.medium,
                urls.large,
                urls.original,
                json_text(metadata),
                now,
            ],
        )?;
        Ok(())
    }

    /// Get all published media for a directory, ordered by position
    pub fn media_for_directory(&self, directory_id: &str) -> Result<Vec<MediaItem>, IndexError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media
             WHERE directory_id = ?1 AND status = 'published'
             ORDER BY position"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![directory_id], row_to_media)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Get every media row regardless of status
    pub fn all_media(&self) -> Result<Vec<MediaItem>, IndexError> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media ORDER BY source_path");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_media)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Delete a media row by id
    pub fn delete_media(&mut self, id: &str) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM media WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete all media rows of a directory, returning how many were removed
    pub fn delete_media_for_directory(&mut self, directory_id: &str) -> Result<u64, IndexError> {
        let removed = self.conn.execute(
            "DELETE FROM media WHERE directory_id = ?1",
            params![directory_id],
        )?;
        Ok(removed as u64)
    }

    /// Get media row count
    pub fn media_count(&self) -> Result<u64, IndexError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Serialize a value into a JSON text column, empty object on failure
fn json_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn row_to_directory(row: &Row) -> SqliteResult<Directory> {
    let status: String = row.get(8)?;
    let tags: String = row.get(10)?;
    let config: String = row.get(11)?;
    let source_path: String = row.get(12)?;
    Ok(Directory {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        cover_media_id: row.get(4)?,
        image_count: row.get(5)?,
        featured: row.get::<_, i64>(6)? != 0,
        menu_order: row.get(7)?,
        status: DirectoryStatus::parse(&status),
        parent_id: row.get(9)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        config: serde_json::from_str(&config).unwrap_or_default(),
        source_path: PathBuf::from(source_path),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn row_to_media(row: &Row) -> SqliteResult<MediaItem> {
    let format: String = row.get(14)?;
    let status: String = row.get(15)?;
    let source_path: String = row.get(16)?;
    let metadata: String = row.get(17)?;
    Ok(MediaItem {
        id: row.get(0)?,
        filename: row.get(1)?,
        title: row.get(2)?,
        directory_id: row.get(3)?,
        position: row.get(4)?,
        urls: Derivatives {
            thumbnail: row.get(5)?,
            small: row.get(6)?,
            medium: row.get(7)?,
            large: row.get(8)?,
            original: row.get(9)?,
        },
        width: row.get::<_, i64>(10)? as u32,
        height: row.get::<_, i64>(11)? as u32,
        aspect_ratio: row.get(12)?,
        file_size: row.get::<_, i64>(13)? as u64,
        format: MediaFormat::parse(&format).unwrap_or(MediaFormat::Jpeg),
        status: MediaStatus::parse(&status),
        source_path: PathBuf::from(source_path),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}
