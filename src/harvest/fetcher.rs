//! Resilient HTTP client
//!
//! This module owns all network traffic for the pipeline:
//! - A single pooled `reqwest` client shared by every in-flight pipeline
//! - Per-request timeout with retry on timeout only (exponential backoff)
//! - Immediate failure classification for transport errors and 4xx/5xx
//! - Text, bytes, and decoded-JSON response kinds

use crate::{HarvestError, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Total attempts per request; only timeouts consume extra attempts
const MAX_ATTEMPTS: u32 = 3;

/// Shared HTTP transport for the whole process
///
/// Constructed once at startup and passed by `Arc` to every component that
/// performs network IO. Connection pooling lives inside the `reqwest`
/// client, so cloning or sharing this value never re-creates connections.
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Builds the shared client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| {
                HarvestError::ServiceUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { inner })
    }

    /// GET a URL, expecting a text body
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.execute(Method::GET, url, None).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// GET a URL, expecting raw bytes (image payloads)
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.execute(Method::GET, url, None).await
    }

    /// GET a URL, expecting a JSON body decoded into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let bytes = self.execute(Method::GET, url, None).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HarvestError::ServiceUnavailable(format!("JSON decode failed: {e}")))
    }

    /// POST a JSON body to a URL, expecting a JSON response
    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let bytes = self.execute(Method::POST, url, Some(body)).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| HarvestError::ServiceUnavailable(format!("JSON decode failed: {e}")))
    }

    /// Sends a request with retry-on-timeout and status classification,
    /// returning the fully read response body
    ///
    /// Retry policy: only timeouts are retried, up to [`MAX_ATTEMPTS`] total,
    /// sleeping `2^attempt` seconds between attempts. The body is consumed
    /// here so a timeout that fires mid-body counts against the same budget
    /// as one that fires before the headers arrive. Connection-level
    /// failures and non-200 statuses fail immediately.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        json_body: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>> {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.inner.request(method.clone(), url);
            if let Some(body) = json_body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => classify_status(url, response).await?,

                Err(e) if e.is_timeout() => {
                    tracing::warn!("Request to {} timed out (attempt {}/{})", url, attempt, MAX_ATTEMPTS);
                    if attempt == MAX_ATTEMPTS {
                        return Err(HarvestError::RequestTimedOut {
                            url: url.to_string(),
                        });
                    }
                    tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    continue;
                }

                Err(e) if e.is_connect() || e.is_request() => {
                    tracing::error!("Transport error for {}: {}", url, e);
                    return Err(HarvestError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                }

                Err(e) => {
                    tracing::error!("Unexpected error for {}: {}", url, e);
                    return Err(HarvestError::ServiceUnavailable(format!(
                        "unexpected error for {url}: {e}"
                    )));
                }
            };

            match response.bytes().await {
                Ok(bytes) => return Ok(bytes.to_vec()),

                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        "Body read from {} timed out (attempt {}/{})",
                        url,
                        attempt,
                        MAX_ATTEMPTS
                    );
                    if attempt == MAX_ATTEMPTS {
                        return Err(HarvestError::RequestTimedOut {
                            url: url.to_string(),
                        });
                    }
                    tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                }

                Err(e) => {
                    tracing::error!("Body read failed for {}: {}", url, e);
                    return Err(HarvestError::ServiceUnavailable(format!(
                        "body read failed for {url}: {e}"
                    )));
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}

/// Maps a response status to success or a typed failure
///
/// 200 hands the response to the caller; 4xx fails as `BadRequest` with the
/// body text captured for diagnostics; 5xx fails as `ServerError`. Neither
/// is ever retried.
async fn classify_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::OK {
        return Ok(response);
    }

    let code = status.as_u16();
    match code {
        400..=499 => {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Client error {} for {}: {}", code, url, body);
            Err(HarvestError::BadRequest {
                url: url.to_string(),
                status: code,
                body,
            })
        }
        500..=599 => {
            tracing::error!("Server error {} for {}", code, url);
            Err(HarvestError::ServerError {
                url: url.to_string(),
                status: code,
            })
        }
        _ => Err(HarvestError::ServiceUnavailable(format!(
            "unexpected status {code} for {url}"
        ))),
    }
}
