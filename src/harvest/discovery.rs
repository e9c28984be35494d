//! Boundary discovery
//!
//! Binary search over the post ID space to find the greatest ID that still
//! hosts a real post. The search is biased upward: `mid` rounds up so the
//! range always shrinks even when `low` and `high` are adjacent.
//!
//! The search never gives up on a failed probe: it logs, waits a fixed
//! delay, and retries the same iteration without narrowing the range. A
//! persistently failing upstream therefore stalls discovery indefinitely;
//! callers that need a hard bound should supply the end ID explicitly.

use crate::config::CatalogConfig;
use crate::harvest::fetcher::HttpClient;
use crate::harvest::parser::is_past_end;
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delay before retrying a failed probe
const PROBE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Finds the greatest ID in `[low, high]` for which the probe reports a
/// real post
///
/// The probe returns `true` when the ID is **past the end** of the catalog
/// (the inverted sense of the upstream's nonexistent-ID signature). For any
/// probe that is false for all IDs <= K and true for all IDs > K within the
/// range, the result is exactly K.
///
/// # Arguments
///
/// * `probe` - Async predicate; `Ok(true)` means the ID is past the end
/// * `low` - Lower bound, assumed to be a valid post ID
/// * `high` - Upper probe ceiling, `low <= high`
pub async fn find_max_valid_id<F, Fut>(mut probe: F, low: u64, high: u64) -> u64
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut low = low;
    let mut high = high;

    while low < high {
        // Round up so low = mid always makes progress; written overflow-free
        // for ceilings near u64::MAX
        let mid = low + (high - low + 1) / 2;

        match probe(mid).await {
            Ok(true) => high = mid - 1,
            Ok(false) => low = mid,
            Err(e) => {
                tracing::warn!(
                    "Probe for ID {} failed: {}; retrying in {:?}",
                    mid,
                    e,
                    PROBE_RETRY_DELAY
                );
                tokio::time::sleep(PROBE_RETRY_DELAY).await;
            }
        }
    }

    low
}

/// Discovers the greatest currently valid post ID in the catalog
///
/// Probes post pages between `low` and the configured ID ceiling, using the
/// absence of the post-list container as the past-the-end signal.
pub async fn discover_max_post_id(
    client: Arc<HttpClient>,
    catalog: &CatalogConfig,
    low: u64,
) -> u64 {
    find_max_valid_id(
        move |id| {
            let client = client.clone();
            let url = catalog.page_url(id);
            async move {
                let body = client.get_text(&url).await?;
                Ok(is_past_end(&body))
            }
        },
        low,
        catalog.id_ceiling,
    )
    .await
}
