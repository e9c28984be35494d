//! Booru-Harvest: an image-post ingestion pipeline
//!
//! This crate discovers and ingests image posts from a numerically-indexed
//! public catalog: it locates the highest currently valid post ID, fetches
//! each post page, extracts image metadata and tags, downloads the image,
//! and records the result in a relational store idempotently.

pub mod config;
pub mod harvest;
pub mod index;
pub mod storage;

use thiserror::Error;

/// Main error type for Booru-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timed out for {url}")]
    RequestTimedOut { url: String },

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Client error {status} for {url}: {body}")]
    BadRequest {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Server error {status} for {url}")]
    ServerError { url: String, status: u16 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected page structure for {url}: {message}")]
    PageStructure { url: String, message: String },

    #[error("Failed to store picture: {0}")]
    InsertFailed(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Booru-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Coordinator, HttpClient, IngestReport};
pub use storage::{SqliteStore, Store};
