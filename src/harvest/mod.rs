//! Harvest module: the ingestion pipeline
//!
//! This module contains the core pipeline logic:
//! - HTTP fetching with retry-on-timeout and failure classification
//! - Post page parsing (image metadata, tags, past-the-end detection)
//! - Boundary discovery over the post ID space
//! - Bounded-concurrency coordination of per-post pipelines

mod coordinator;
mod discovery;
mod fetcher;
mod parser;

pub use coordinator::{Coordinator, IngestReport};
pub use discovery::{discover_max_post_id, find_max_valid_id};
pub use fetcher::HttpClient;
pub use parser::{extract_image, extract_tags, is_past_end, parse_post_page, ImageMeta, PostPage};
