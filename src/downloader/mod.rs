//! The fetch engine
//!
//! [`Downloader::execute`] turns a [`Task`] into one [`FetchResult`] per item:
//!
//! 1. Every id starts on a work stack (LIFO, so the last-added item goes first)
//!    with an attempt counter of zero.
//! 2. Popped ids are looked up in the cache when the task caches: content hits
//!    become successes, poison markers become skips, neither touches the network.
//! 3. Misses accumulate into a batch, dispatched once it is full or the stack is
//!    empty. A batch is a barrier: all requests run concurrently and all complete
//!    before any response is classified.
//! 4. Rejected items go back on the stack until they run out of attempts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheLookup, CacheStore};
use crate::error::Result;
use crate::task::Task;
use crate::transport::{HttpTransport, Transport};
use crate::types::{FetchResult, ItemId};

mod batch;

use batch::{Classified, DispatchBatchParams, dispatch_batch};

/// Fetch engine bound to a cache store and a transport
///
/// Cheap to clone; clones share the same cache and transport.
#[derive(Clone)]
pub struct Downloader {
    cache: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
}

impl Downloader {
    /// Engine using the default [`HttpTransport`]
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_transport(cache, Arc::new(HttpTransport::new()))
    }

    /// Engine using a custom transport
    pub fn with_transport(cache: Arc<dyn CacheStore>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    /// Run a task to completion
    ///
    /// The returned map holds exactly one entry per distinct item id. Fails only if
    /// the transport cannot initialize a batch or the cache store errors; no partial
    /// map is returned in that case.
    pub async fn execute(&self, task: &Task) -> Result<HashMap<ItemId, FetchResult>> {
        let started = Instant::now();

        let urls: HashMap<ItemId, String> = task
            .items()
            .map(|(id, url)| (id.clone(), url.to_string()))
            .collect();
        let mut attempts: HashMap<ItemId, u32> =
            urls.keys().map(|id| (id.clone(), 0)).collect();
        let mut stack: Vec<ItemId> = task.items().map(|(id, _)| id.clone()).collect();
        let mut results: HashMap<ItemId, FetchResult> = HashMap::with_capacity(urls.len());
        let mut pending: Vec<ItemId> = Vec::with_capacity(task.batch_size());
        let mut batches = 0usize;

        loop {
            let Some(id) = stack.pop() else {
                // Drained through cache hits while ids were still waiting for a batch
                if pending.is_empty() {
                    break;
                }
                batches += 1;
                self.flush(task, &urls, &mut attempts, &mut pending, &mut stack, &mut results)
                    .await?;
                continue;
            };

            if let Some(result) = self.lookup_cached(task, &id).await? {
                results.insert(id, result);
                continue;
            }

            pending.push(id);
            if pending.len() >= task.batch_size() || stack.is_empty() {
                batches += 1;
                self.flush(task, &urls, &mut attempts, &mut pending, &mut stack, &mut results)
                    .await?;
            }
        }

        let elapsed = started.elapsed();
        tracing::info!(
            count = task.item_count(),
            batches,
            successful = results.values().filter(|r| r.successful()).count(),
            failed = results.values().filter(|r| r.failed()).count(),
            skipped = results.values().filter(|r| r.skipped()).count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Fetched data from {} URL(s) in {:.3} sec.",
            task.item_count(),
            elapsed.as_secs_f64()
        );

        Ok(results)
    }

    /// Serve an item from the cache if the task caches and the key is live.
    async fn lookup_cached(&self, task: &Task, id: &ItemId) -> Result<Option<FetchResult>> {
        if !task.cache() {
            return Ok(None);
        }

        let key = task.cache_key(id)?;
        Ok(match self.cache.get(&key).await? {
            CacheLookup::Content(content) => {
                tracing::debug!(item_id = %id, key = %key, "Serving cached content");
                Some(FetchResult::Successful(content))
            }
            CacheLookup::Poisoned => {
                tracing::debug!(item_id = %id, key = %key, "Skipping throttled item");
                Some(FetchResult::Skipped)
            }
            CacheLookup::Miss => None,
        })
    }

    /// Dispatch the pending batch, recording terminal results and requeueing retries.
    async fn flush(
        &self,
        task: &Task,
        urls: &HashMap<ItemId, String>,
        attempts: &mut HashMap<ItemId, u32>,
        pending: &mut Vec<ItemId>,
        stack: &mut Vec<ItemId>,
        results: &mut HashMap<ItemId, FetchResult>,
    ) -> Result<()> {
        let outcomes = dispatch_batch(DispatchBatchParams {
            task,
            transport: self.transport.as_ref(),
            cache: self.cache.as_ref(),
            batch: std::mem::take(pending),
            urls,
            attempts,
        })
        .await?;

        for (id, outcome) in outcomes {
            match outcome {
                Classified::Done(result) => {
                    results.insert(id, result);
                }
                Classified::Retry => stack.push(id),
            }
        }
        Ok(())
    }
}
