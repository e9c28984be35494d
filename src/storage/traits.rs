//! Storage trait and error types

use crate::storage::{NewPicture, PictureRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the relational store behind the ingestion writer
///
/// The writer is the sole owner of the `pictures`, `tags`, and
/// `picture_tags` tables; downstream collaborators only read picture
/// identifiers returned from [`Store::upsert_post`].
pub trait Store {
    /// Atomically upserts a picture and reconciles its tag associations
    ///
    /// Runs as a single transaction:
    /// 1. Resolve existing tags named in `tag_names`
    /// 2. Create missing tags so identifiers are available
    /// 3. Upsert the picture keyed by `url_image` (mutable fields updated
    ///    in place on conflict)
    /// 4. Load the picture's current associations
    /// 5. Diff against the resolved tag set
    /// 6. Delete stale associations, insert new ones
    /// 7. Commit
    ///
    /// After a successful call the picture's tag set is exactly the set of
    /// names passed in (duplicates collapse). Any failure rolls the whole
    /// operation back.
    ///
    /// # Returns
    ///
    /// The picture's identifier.
    fn upsert_post(&mut self, picture: &NewPicture, tag_names: &[String]) -> StorageResult<i64>;

    /// Gets a picture by its source image URL
    fn get_picture_by_image_url(&self, url_image: &str) -> StorageResult<Option<PictureRecord>>;

    /// Gets the names of all tags associated with a picture, sorted
    fn get_tags_for_picture(&self, picture_id: i64) -> StorageResult<Vec<String>>;

    /// Counts picture rows
    fn count_pictures(&self) -> StorageResult<u64>;

    /// Counts tag rows
    fn count_tags(&self) -> StorageResult<u64>;

    /// Counts picture/tag association rows
    fn count_associations(&self) -> StorageResult<u64>;
}
