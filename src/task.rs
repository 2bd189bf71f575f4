//! Task execution plans and their builder
//!
//! A [`Task`] is immutable and only obtainable from a [`TaskBuilder`]. The builder
//! validates each setting at the call that provides it, so a misconfigured plan
//! never reaches [`Downloader::execute`](crate::Downloader::execute).
//!
//! ```
//! use fetch_dl::Task;
//!
//! # fn main() -> fetch_dl::Result<()> {
//! let mut builder = Task::builder();
//! builder.batch(12)?.retry(2)?.throttle(30)?;
//! for i in 0..64 {
//!     builder.add(i, "http://example.com");
//! }
//! let task = builder.build();
//! assert_eq!(task.item_count(), 64);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{ItemId, OptionValue, TransportOptions};

/// Predicate over a response: `(content, id, url) -> accepted`
pub type Validator = Arc<dyn Fn(&str, &ItemId, &str) -> bool + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
struct CacheSettings {
    key_prefix: String,
    time_to_live: Duration,
}

/// Immutable execution plan for one fetch run
#[derive(Clone)]
pub struct Task {
    batch_size: usize,
    max_retries: u32,
    cache: Option<CacheSettings>,
    throttle: Duration,
    items: Arc<Vec<(ItemId, String)>>,
    validators: Arc<Vec<Validator>>,
    options: Arc<TransportOptions>,
}

impl Task {
    /// Start configuring a new task
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }

    /// Maximum number of requests in flight per dispatch round
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Total attempts allowed per item, the first attempt included
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether results are cached (true iff a cache prefix was configured)
    pub fn cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Prefix prepended to item ids to form cache keys
    pub fn cache_key_prefix(&self) -> Result<&str> {
        self.cache
            .as_ref()
            .map(|c| c.key_prefix.as_str())
            .ok_or(Error::MissingCacheConfiguration)
    }

    /// Lifetime of successful cache entries
    pub fn time_to_live(&self) -> Result<Duration> {
        self.cache
            .as_ref()
            .map(|c| c.time_to_live)
            .ok_or(Error::MissingCacheConfiguration)
    }

    /// Cache key for an item: prefix followed by the id
    pub fn cache_key(&self, id: &ItemId) -> Result<String> {
        Ok(format!("{}{}", self.cache_key_prefix()?, id))
    }

    /// Lifetime of poison markers written for exhausted items
    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    /// Items as `(id, url)` pairs, in first-insertion order
    pub fn items(&self) -> impl Iterator<Item = (&ItemId, &str)> {
        self.items.iter().map(|(id, url)| (id, url.as_str()))
    }

    /// Number of distinct item ids
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Validators in declared order
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Options handed to the transport for every request
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Run the validators in order, stopping at the first rejection.
    pub fn accepts(&self, content: &str, id: &ItemId, url: &str) -> bool {
        self.validators.iter().all(|v| v(content, id, url))
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("cache", &self.cache)
            .field("throttle", &self.throttle)
            .field("items", &self.items.len())
            .field("validators", &self.validators.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Accumulates and validates task configuration
///
/// Fallible setters return `Result<&mut Self>` so calls chain with `?`. The builder
/// stays usable after [`build`](Self::build); tasks already built are snapshots and
/// do not see later changes.
#[derive(Clone)]
pub struct TaskBuilder {
    batch_size: usize,
    max_retries: u32,
    cache: Option<CacheSettings>,
    throttle: Duration,
    items: Vec<(ItemId, String)>,
    positions: HashMap<ItemId, usize>,
    validators: Vec<Validator>,
    options: TransportOptions,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            batch_size: 1,
            max_retries: 1,
            cache: None,
            throttle: Duration::ZERO,
            items: Vec::new(),
            positions: HashMap::new(),
            validators: Vec::new(),
            options: TransportOptions::new(),
        }
    }
}

impl TaskBuilder {
    /// Enable caching under `key_prefix`, keeping successes for `time_to_live` seconds
    pub fn cache(&mut self, key_prefix: impl Into<String>, time_to_live: u64) -> &mut Self {
        self.cache = Some(CacheSettings {
            key_prefix: key_prefix.into(),
            time_to_live: Duration::from_secs(time_to_live),
        });
        self
    }

    /// Maximum concurrent requests per round (at least 1)
    pub fn batch(&mut self, size: usize) -> Result<&mut Self> {
        if size < 1 {
            return Err(Error::invalid(
                "batch_size",
                format!("Invalid batch size: {}", size),
            ));
        }
        self.batch_size = size;
        Ok(self)
    }

    /// Total attempts per item (at least 1)
    pub fn retry(&mut self, max_retries: u32) -> Result<&mut Self> {
        if max_retries < 1 {
            return Err(Error::invalid(
                "max_retries",
                format!("Invalid max retries number: {}", max_retries),
            ));
        }
        self.max_retries = max_retries;
        Ok(self)
    }

    /// Add an item. Re-adding an id replaces its URL and keeps its position.
    pub fn add(&mut self, id: impl Into<ItemId>, url: impl Into<String>) -> &mut Self {
        let id = id.into();
        let url = url.into();
        match self.positions.get(&id) {
            Some(&pos) => self.items[pos].1 = url,
            None => {
                self.positions.insert(id.clone(), self.items.len());
                self.items.push((id, url));
            }
        }
        self
    }

    /// Add an item whose id comes from untyped input (config files, JSON payloads)
    ///
    /// Fails with [`Error::InvalidConfiguration`] unless the id is an integer or a string.
    pub fn try_add(
        &mut self,
        id: serde_json::Value,
        url: impl Into<String>,
    ) -> Result<&mut Self> {
        let id = ItemId::try_from(id)?;
        Ok(self.add(id, url))
    }

    /// Append a validator; validators run in the order they were added
    pub fn validate<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&str, &ItemId, &str) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    pub(crate) fn push_validator(&mut self, validator: Validator) -> &mut Self {
        self.validators.push(validator);
        self
    }

    /// Poison marker lifetime in seconds (not negative)
    pub fn throttle(&mut self, pause: i64) -> Result<&mut Self> {
        let secs = u64::try_from(pause)
            .map_err(|_| Error::invalid("throttle", format!("Invalid throttle pause: {}", pause)))?;
        self.throttle = Duration::from_secs(secs);
        Ok(self)
    }

    /// Merge transport options, replacing values of keys already set
    pub fn options<I, K, V>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OptionValue>,
    {
        self.options
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a single transport option
    pub fn option(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Snapshot the current configuration into a [`Task`]
    pub fn build(&self) -> Task {
        Task {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            cache: self.cache.clone(),
            throttle: self.throttle,
            items: Arc::new(self.items.clone()),
            validators: Arc::new(self.validators.clone()),
            options: Arc::new(self.options.clone()),
        }
    }
}
