use serde::Deserialize;

/// Main configuration structure for Booru-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub harvest: HarvestConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: Option<IndexConfig>,
}

/// Upstream catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Post page URL template; `{id}` is replaced with the post ID
    #[serde(rename = "page-url-template")]
    pub page_url_template: String,

    /// Upper probe ceiling for boundary discovery
    #[serde(rename = "id-ceiling", default = "default_id_ceiling")]
    pub id_ceiling: u64,
}

/// Ingestion behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Maximum number of post pipelines in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory that downloaded images are written into
    #[serde(rename = "image-root")]
    pub image_root: String,
}

/// Optional search-index sink configuration
///
/// When the `[index]` section is absent, ingested pictures are not
/// published anywhere and the coordinator uses a no-op sink.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index service
    pub endpoint: String,

    /// Name of the index documents are written to
    #[serde(rename = "index-name")]
    pub index_name: String,
}

fn default_id_ceiling() -> u64 {
    10_000_000
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    10
}

impl CatalogConfig {
    /// Renders the page URL for a post ID from the configured template
    pub fn page_url(&self, post_id: u64) -> String {
        self.page_url_template
            .replace("{id}", &post_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_substitution() {
        let catalog = CatalogConfig {
            page_url_template: "https://example.org/post?id={id}".to_string(),
            id_ceiling: 100,
        };
        assert_eq!(catalog.page_url(42), "https://example.org/post?id=42");
    }
}
