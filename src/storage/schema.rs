//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
///
/// `pictures.url_image` is unique: it is the natural key that makes
/// re-ingestion of the same post idempotent. `tags.name` is unique so two
/// pipelines racing on a new tag cannot create it twice.
pub const SCHEMA_SQL: &str = r#"
-- Ingested pictures, one row per source image
CREATE TABLE IF NOT EXISTS pictures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    url_page TEXT NOT NULL,
    url_image TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pictures_url_image ON pictures(url_image);

-- Tag vocabulary, created lazily on first sight
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Many-to-many picture/tag association, no duplicate edges
CREATE TABLE IF NOT EXISTS picture_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    picture_id INTEGER NOT NULL REFERENCES pictures(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    UNIQUE(picture_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_picture_tags_picture ON picture_tags(picture_id);
CREATE INDEX IF NOT EXISTS idx_picture_tags_tag ON picture_tags(tag_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
