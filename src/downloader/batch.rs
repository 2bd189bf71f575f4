//! One fan-out/fan-in round through the transport, followed by validation and
//! classification of every response in the batch.

use std::collections::HashMap;

use crate::cache::CacheStore;
use crate::error::Result;
use crate::task::Task;
use crate::transport::{FetchRequest, Transport};
use crate::types::{FetchResult, ItemId};

/// What became of one item after a batch
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Classified {
    /// Terminal result for the item
    Done(FetchResult),
    /// Attempts remain; push the item back onto the work stack
    Retry,
}

/// Parameters for dispatching one batch
pub(super) struct DispatchBatchParams<'a> {
    pub(super) task: &'a Task,
    pub(super) transport: &'a dyn Transport,
    pub(super) cache: &'a dyn CacheStore,
    /// Ids in the order they joined the batch
    pub(super) batch: Vec<ItemId>,
    pub(super) urls: &'a HashMap<ItemId, String>,
    pub(super) attempts: &'a mut HashMap<ItemId, u32>,
}

/// Dispatch one batch and classify every item in it.
///
/// Returns `(id, outcome)` pairs in batch order. Only transport initialization and
/// cache failures are errors; per-item failures become [`Classified::Retry`] or
/// [`FetchResult::Failed`].
pub(super) async fn dispatch_batch(
    params: DispatchBatchParams<'_>,
) -> Result<Vec<(ItemId, Classified)>> {
    let DispatchBatchParams {
        task,
        transport,
        cache,
        batch,
        urls,
        attempts,
    } = params;

    let requests: Vec<FetchRequest> = batch
        .iter()
        .map(|id| FetchRequest {
            id: id.clone(),
            url: urls.get(id).cloned().unwrap_or_default(),
        })
        .collect();

    for id in &batch {
        *attempts.entry(id.clone()).or_insert(0) += 1;
    }

    tracing::debug!(batch_size = requests.len(), "Dispatching batch");
    let mut responses = transport.fetch_batch(&requests, task.options()).await?;

    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let FetchRequest { id, url } = request;
        let content = responses.remove(&id).flatten();
        let attempt = attempts.get(&id).copied().unwrap_or(0);

        let accepted = content.filter(|body| task.accepts(body, &id, &url));
        let outcome = classify(task, cache, &id, &url, accepted, attempt).await?;
        outcomes.push((id, outcome));
    }

    Ok(outcomes)
}

/// Decide the fate of one item and write the matching cache entry.
async fn classify(
    task: &Task,
    cache: &dyn CacheStore,
    id: &ItemId,
    url: &str,
    accepted: Option<String>,
    attempt: u32,
) -> Result<Classified> {
    if let Some(content) = accepted {
        if task.cache() {
            cache
                .put(&task.cache_key(id)?, Some(&content), task.time_to_live()?)
                .await?;
        }
        tracing::debug!(item_id = %id, url, attempt, "Response accepted");
        return Ok(Classified::Done(FetchResult::Successful(content)));
    }

    if attempt >= task.max_retries() {
        if task.cache() {
            cache
                .put(&task.cache_key(id)?, None, task.throttle())
                .await?;
        }
        tracing::warn!(
            item_id = %id,
            url,
            attempts = attempt,
            throttle_secs = task.throttle().as_secs(),
            "Giving up after all attempts failed"
        );
        return Ok(Classified::Done(FetchResult::Failed));
    }

    tracing::debug!(
        item_id = %id,
        url,
        attempt,
        max_retries = task.max_retries(),
        "Response rejected, will retry"
    );
    Ok(Classified::Retry)
}
