//! SQLite store implementation
//!
//! This module provides the SQLite-backed implementation of the [`Store`]
//! trait, including the transactional upsert that is the heart of the
//! ingestion writer.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StorageError, StorageResult};
use crate::storage::{NewPicture, PictureRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at the given path
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (useful for tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Store for SqliteStore {
    fn upsert_post(&mut self, picture: &NewPicture, tag_names: &[String]) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        // Dropping the transaction on any error path rolls everything back
        let picture_id = upsert_post_in_tx(&tx, picture, tag_names)?;
        tx.commit()?;
        Ok(picture_id)
    }

    fn get_picture_by_image_url(&self, url_image: &str) -> StorageResult<Option<PictureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, width, height, url_page, url_image, path, created_at, updated_at
             FROM pictures WHERE url_image = ?1",
        )?;

        let picture = stmt
            .query_row(params![url_image], |row| {
                Ok(PictureRecord {
                    id: row.get(0)?,
                    width: row.get(1)?,
                    height: row.get(2)?,
                    url_page: row.get(3)?,
                    url_image: row.get(4)?,
                    path: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .optional()?;

        Ok(picture)
    }

    fn get_tags_for_picture(&self, picture_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM tags t
             JOIN picture_tags pt ON pt.tag_id = t.id
             WHERE pt.picture_id = ?1
             ORDER BY t.name",
        )?;

        let names = stmt
            .query_map(params![picture_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    fn count_pictures(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_tags(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_associations(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM picture_tags", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Runs the seven-step upsert inside an open transaction
fn upsert_post_in_tx(
    tx: &Transaction<'_>,
    picture: &NewPicture,
    tag_names: &[String],
) -> StorageResult<i64> {
    // Steps 1-2: resolve every tag name to an ID, creating missing tags.
    // The unique constraint on name plus DO NOTHING makes this safe against
    // a concurrent writer racing on the same new tag.
    let desired_tags = resolve_tag_ids(tx, tag_names)?;

    // Step 3: upsert the picture keyed by url_image
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO pictures (width, height, url_page, url_image, path, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(url_image) DO UPDATE SET
             width = excluded.width,
             height = excluded.height,
             url_page = excluded.url_page,
             path = excluded.path,
             updated_at = excluded.updated_at",
        params![
            picture.width,
            picture.height,
            picture.url_page,
            picture.url_image,
            picture.path,
            now
        ],
    )?;

    let picture_id: i64 = tx.query_row(
        "SELECT id FROM pictures WHERE url_image = ?1",
        params![picture.url_image],
        |row| row.get(0),
    )?;

    // Step 4: load current associations
    let existing_tags = {
        let mut stmt = tx.prepare("SELECT tag_id FROM picture_tags WHERE picture_id = ?1")?;
        let rows = stmt.query_map(params![picture_id], |row| row.get::<_, i64>(0))?;
        rows.collect::<Result<HashSet<i64>, _>>()?
    };

    // Step 5: symmetric difference against the desired tag set
    let to_add: Vec<i64> = desired_tags.difference(&existing_tags).copied().collect();
    let to_remove: Vec<i64> = existing_tags.difference(&desired_tags).copied().collect();

    // Step 6: apply the diff
    {
        let mut delete =
            tx.prepare("DELETE FROM picture_tags WHERE picture_id = ?1 AND tag_id = ?2")?;
        for tag_id in &to_remove {
            delete.execute(params![picture_id, tag_id])?;
        }

        let mut insert =
            tx.prepare("INSERT INTO picture_tags (picture_id, tag_id) VALUES (?1, ?2)")?;
        for tag_id in &to_add {
            insert.execute(params![picture_id, tag_id])?;
        }
    }

    Ok(picture_id)
}

/// Resolves tag names to IDs, creating rows for names not yet present
fn resolve_tag_ids(tx: &Transaction<'_>, tag_names: &[String]) -> StorageResult<HashSet<i64>> {
    let mut insert = tx.prepare("INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")?;
    let mut select = tx.prepare("SELECT id FROM tags WHERE name = ?1")?;

    let mut tag_ids = HashSet::new();
    for name in tag_names {
        insert.execute(params![name])?;
        let id: i64 = select.query_row(params![name], |row| row.get(0))?;
        tag_ids.insert(id);
    }

    Ok(tag_ids)
}
