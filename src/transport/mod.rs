//! Transport abstraction for fetching one batch concurrently

use std::collections::HashMap;

use crate::error::Result;
use crate::types::{ItemId, TransportOptions};

mod http;

pub use http::HttpTransport;

/// One request in a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Item the response belongs to
    pub id: ItemId,
    /// Target URL
    pub url: String,
}

/// Responses of one batch: `Some(content)` on a completed fetch, `None` otherwise
pub type BatchResponses = HashMap<ItemId, Option<String>>;

/// Fetches a batch of requests concurrently
///
/// Implementations must return only after every request of the batch has finished
/// and must release per-batch resources (connections, clients) before returning.
/// A failed request is reported as `None`; `Err` is reserved for failing to set up
/// the dispatch context at all, which aborts the whole run.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch every request, applying `options` to each of them
    async fn fetch_batch(
        &self,
        requests: &[FetchRequest],
        options: &TransportOptions,
    ) -> Result<BatchResponses>;
}
