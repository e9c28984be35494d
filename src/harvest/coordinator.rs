//! Ingestion coordinator
//!
//! Drives per-post pipelines across a range of IDs under a bounded
//! concurrency gate. Each pipeline is strictly sequential: fetch the post
//! page, parse image metadata and tags, fetch the image bytes, write them
//! to the image root, then hand everything to the transactional writer and
//! publish to the index sink.
//!
//! Pipelines for different IDs may interleave and complete in any order;
//! the gate only bounds how many are in flight. A failed pipeline is caught
//! at its boundary, logged with the offending ID, recorded in the report,
//! and never aborts its siblings.

use crate::config::{CatalogConfig, Config};
use crate::harvest::discovery::discover_max_post_id;
use crate::harvest::fetcher::HttpClient;
use crate::harvest::parser::parse_post_page;
use crate::index::IndexSink;
use crate::storage::{NewPicture, SqliteStore, Store};
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one range ingestion
///
/// Failures are visible here as well as in the logs, so callers get per-ID
/// accounting instead of an unconditional success.
#[derive(Debug)]
pub struct IngestReport {
    /// First ID of the processed range
    pub start_id: u64,
    /// Last ID of the processed range (discovered when not given)
    pub end_id: u64,
    /// Number of pipelines that completed successfully
    pub succeeded: u64,
    /// IDs whose pipeline failed, sorted
    pub failed: Vec<u64>,
}

/// Everything one pipeline needs, cloned into each spawned task
#[derive(Clone)]
struct PipelineCtx {
    catalog: CatalogConfig,
    image_root: PathBuf,
    client: Arc<HttpClient>,
    store: Arc<Mutex<SqliteStore>>,
    index: Arc<dyn IndexSink>,
}

/// Main ingestion coordinator
pub struct Coordinator {
    config: Arc<Config>,
    client: Arc<HttpClient>,
    store: Arc<Mutex<SqliteStore>>,
    index: Arc<dyn IndexSink>,
}

impl Coordinator {
    /// Creates a coordinator from explicitly injected collaborators
    ///
    /// The HTTP client, store, and index sink are constructed once at
    /// startup and passed in; the coordinator never creates its own.
    pub fn new(
        config: Config,
        client: Arc<HttpClient>,
        store: Arc<Mutex<SqliteStore>>,
        index: Arc<dyn IndexSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            store,
            index,
        }
    }

    /// Ingests every post in `[start_id, end_id]`
    ///
    /// When `end_id` is `None` the upper bound is discovered by probing the
    /// catalog from `start_id` up to the configured ceiling.
    ///
    /// Individual pipeline failures do not abort the range; they are
    /// reported in the returned [`IngestReport`]. Failed IDs are not
    /// retried within this pass.
    pub async fn ingest_range(&self, start_id: u64, end_id: Option<u64>) -> Result<IngestReport> {
        let end_id = match end_id {
            Some(id) => id,
            None => {
                tracing::info!("Discovering catalog boundary from ID {}", start_id);
                let max = discover_max_post_id(
                    self.client.clone(),
                    &self.config.catalog,
                    start_id,
                )
                .await;
                tracing::info!("Catalog boundary discovered: {}", max);
                max
            }
        };

        if start_id > end_id {
            tracing::warn!("Empty range: start {} > end {}", start_id, end_id);
            return Ok(IngestReport {
                start_id,
                end_id,
                succeeded: 0,
                failed: Vec::new(),
            });
        }

        let image_root = PathBuf::from(&self.config.storage.image_root);
        tokio::fs::create_dir_all(&image_root).await?;

        let ctx = PipelineCtx {
            catalog: self.config.catalog.clone(),
            image_root,
            client: self.client.clone(),
            store: self.store.clone(),
            index: self.index.clone(),
        };

        let total = end_id - start_id + 1;
        tracing::info!(
            "Ingesting {} posts ({}..={}) with concurrency {}",
            total,
            start_id,
            end_id,
            self.config.harvest.concurrency
        );

        let results = for_each_id_bounded(
            start_id..=end_id,
            self.config.harvest.concurrency,
            move |id| ingest_post(ctx.clone(), id),
        )
        .await;

        let mut succeeded = 0;
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::error!("Error processing post {}: {}", id, e);
                    failed.push(id);
                }
            }
        }
        failed.sort_unstable();

        tracing::info!(
            "Range complete: {} succeeded, {} failed",
            succeeded,
            failed.len()
        );

        Ok(IngestReport {
            start_id,
            end_id,
            succeeded,
            failed,
        })
    }
}

/// Runs one job per ID with at most `limit` jobs in flight
///
/// This is a counting admission gate, not a worker-per-thread pool: any
/// free slot picks up any pending ID, and completion order is unspecified.
/// Every spawned ID appears in the output exactly once; a job that panics
/// is recorded as a failure for its ID.
async fn for_each_id_bounded<F, Fut>(
    ids: RangeInclusive<u64>,
    limit: usize,
    job: F,
) -> Vec<(u64, Result<()>)>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let gate = Arc::new(Semaphore::new(limit));
    let mut tasks = JoinSet::new();
    let mut spawned = Vec::new();

    for id in ids {
        // Acquire before spawning so a large range does not pile up parked
        // tasks; the semaphore is never closed, so this cannot fail
        let permit = gate
            .clone()
            .acquire_owned()
            .await
            .expect("admission gate closed");
        let fut = job(id);
        tasks.spawn(async move {
            let _permit = permit;
            (id, fut.await)
        });
        spawned.push(id);
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(e) => tracing::error!("Pipeline task panicked: {}", e),
        }
    }

    // A panicked task never reported its pair; charge the missing IDs as
    // failures so the report still accounts for every ID in the range
    if results.len() != spawned.len() {
        let reported: HashSet<u64> = results.iter().map(|(id, _)| *id).collect();
        for id in spawned {
            if !reported.contains(&id) {
                results.push((
                    id,
                    Err(HarvestError::ServiceUnavailable(format!(
                        "pipeline for post {id} panicked"
                    ))),
                ));
            }
        }
    }

    results
}

/// One post's pipeline: fetch page, parse, fetch image, write, persist
async fn ingest_post(ctx: PipelineCtx, post_id: u64) -> Result<()> {
    let page_url = ctx.catalog.page_url(post_id);
    tracing::debug!("Processing post {}", post_id);

    let body = ctx.client.get_text(&page_url).await?;
    let page = parse_post_page(&body, &page_url)?;

    let image_bytes = ctx.client.get_bytes(&page.image.source_url).await?;

    let path = ctx.image_root.join(format!("image_{post_id}.jpg"));
    tokio::fs::write(&path, &image_bytes).await?;

    let picture = NewPicture {
        width: page.image.width,
        height: page.image.height,
        url_page: page_url,
        url_image: page.image.source_url,
        path: path.to_string_lossy().into_owned(),
    };

    let picture_id = {
        let mut store = ctx.store.lock().unwrap();
        store.upsert_post(&picture, &page.tags)?
    };

    ctx.index.publish(picture_id, &page.tags).await?;

    tracing::info!(
        "Ingested post {} as picture {} ({} tags)",
        post_id,
        picture_id,
        page.tags.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_gate_bounds_in_flight_jobs() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let results = {
            let active = active.clone();
            let max_seen = max_seen.clone();
            for_each_id_bounded(1..=10, 3, move |_| {
                let active = active.clone();
                let max_seen = max_seen.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
        };

        assert_eq!(results.len(), 10);
        assert!(
            max_seen.load(Ordering::SeqCst) <= 3,
            "more than 3 pipelines were in flight at once"
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let results = for_each_id_bounded(1..=5, 2, |id| async move {
            if id % 2 == 0 {
                Err(crate::HarvestError::ServiceUnavailable("boom".to_string()))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(results.len(), 5);
        let failed: Vec<u64> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.contains(&2) && failed.contains(&4));
    }

    #[tokio::test]
    async fn test_panicked_job_counted_as_failure() {
        let results = for_each_id_bounded(1..=5, 2, |id| async move {
            if id == 3 {
                panic!("pipeline blew up");
            }
            Ok(())
        })
        .await;

        assert_eq!(results.len(), 5, "every ID must be accounted for");
        let failed: Vec<u64> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(failed, vec![3]);
    }

    #[tokio::test]
    async fn test_all_ids_processed_once() {
        let results = for_each_id_bounded(5..=9, 2, |_| async move { Ok(()) }).await;
        let mut ids: Vec<u64> = results.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![5, 6, 7, 8, 9]);
    }
}
