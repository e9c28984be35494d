//! Downstream search-index sink
//!
//! After a successful ingestion the coordinator hands `(picture_id, tags)`
//! to an [`IndexSink`]. The sink is an injected dependency: the pipeline
//! does not own the index, it only publishes to it, and a missing `[index]`
//! config section swaps in a no-op implementation.

use crate::config::IndexConfig;
use crate::harvest::HttpClient;
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Receives picture/tag documents after successful writes
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Publishes one picture's tag document
    async fn publish(&self, picture_id: i64, tags: &[String]) -> Result<()>;
}

/// HTTP-backed sink that POSTs documents to a search-index service
pub struct HttpIndexSink {
    client: Arc<HttpClient>,
    endpoint: String,
    index_name: String,
}

impl HttpIndexSink {
    pub fn new(client: Arc<HttpClient>, config: &IndexConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index_name: config.index_name.clone(),
        }
    }
}

#[async_trait]
impl IndexSink for HttpIndexSink {
    async fn publish(&self, picture_id: i64, tags: &[String]) -> Result<()> {
        let url = format!("{}/{}/_doc/{}", self.endpoint, self.index_name, picture_id);
        let document = json!({
            "picture_id": picture_id,
            "tags": tags,
        });

        self.client.post_json(&url, &document).await?;
        tracing::debug!("Published picture {} to index {}", picture_id, self.index_name);
        Ok(())
    }
}

/// Sink used when no index is configured
pub struct NoopIndexSink;

#[async_trait]
impl IndexSink for NoopIndexSink {
    async fn publish(&self, picture_id: i64, _tags: &[String]) -> Result<()> {
        tracing::trace!("No index configured, skipping publish for picture {}", picture_id);
        Ok(())
    }
}

/// Builds the sink matching the configuration
pub fn sink_from_config(
    client: Arc<HttpClient>,
    config: Option<&IndexConfig>,
) -> Arc<dyn IndexSink> {
    match config {
        Some(index) => Arc::new(HttpIndexSink::new(client, index)),
        None => Arc::new(NoopIndexSink),
    }
}
