//! Storage module for persisting ingested posts
//!
//! This module owns the relational side of the pipeline:
//! - SQLite database initialization and schema management
//! - The transactional picture upsert with tag reconciliation
//! - Read helpers used by tests and the stats command

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Attributes for a picture about to be written
///
/// `url_image` is the natural key: re-ingesting a post with the same source
/// image URL updates the existing row instead of creating a new one.
#[derive(Debug, Clone)]
pub struct NewPicture {
    pub width: u32,
    pub height: u32,
    pub url_page: String,
    pub url_image: String,
    pub path: String,
}

/// A picture row as stored in the database
#[derive(Debug, Clone)]
pub struct PictureRecord {
    pub id: i64,
    pub width: u32,
    pub height: u32,
    pub url_page: String,
    pub url_image: String,
    pub path: String,
    pub created_at: String,
    pub updated_at: String,
}
