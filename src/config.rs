//! Declarative task configuration
//!
//! A [`TaskConfig`] describes a task as data (JSON) and turns into a
//! [`TaskBuilder`] through the same validating setters used in code, so a bad
//! value in a file fails exactly like a bad value passed to the builder.
//!
//! ```json
//! {
//!   "batch_size": 12,
//!   "max_retries": 2,
//!   "throttle": 30,
//!   "cache": { "key_prefix": "feeds.", "time_to_live": 3600 },
//!   "options": { "timeout": 10, "fail_on_error": true },
//!   "validators": [ { "kind": "non_empty" }, { "kind": "contains", "needle": "<rss" } ],
//!   "items": [ { "id": 1, "url": "https://example.com/feed.xml" } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::task::{TaskBuilder, Validator};
use crate::types::TransportOptions;
use crate::validators;

/// Cache section of a [`TaskConfig`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix prepended to item ids to form cache keys
    pub key_prefix: String,

    /// Lifetime of successful entries, in seconds
    #[serde(with = "duration_serde")]
    pub time_to_live: Duration,
}

/// One item to fetch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Item id; must be an integer or a string
    pub id: serde_json::Value,
    /// URL to fetch
    pub url: String,
}

/// Built-in validator selectable from configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidatorConfig {
    /// Body must not be empty
    NonEmpty,
    /// Body must contain `needle`
    Contains {
        /// Substring to look for
        needle: String,
    },
    /// Body must match `pattern`
    Matches {
        /// Regular expression
        pattern: String,
    },
    /// Body must parse as JSON
    Json,
}

impl ValidatorConfig {
    fn into_validator(self) -> Result<Validator> {
        let validator: Validator = match self {
            ValidatorConfig::NonEmpty => Arc::new(validators::non_empty()),
            ValidatorConfig::Contains { needle } => Arc::new(validators::contains(needle)),
            ValidatorConfig::Matches { pattern } => Arc::new(validators::matches(&pattern)?),
            ValidatorConfig::Json => Arc::new(validators::json()),
        };
        Ok(validator)
    }
}

/// Task described as data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Maximum concurrent requests per round (default: 1)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total attempts per item (default: 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Poison marker lifetime in seconds (default: 0)
    #[serde(default)]
    pub throttle: i64,

    /// Caching; disabled when absent
    #[serde(default)]
    pub cache: Option<CacheConfig>,

    /// Transport options
    #[serde(default)]
    pub options: TransportOptions,

    /// Validators, applied in order
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,

    /// Items to fetch
    #[serde(default)]
    pub items: Vec<ItemConfig>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            throttle: 0,
            cache: None,
            options: TransportOptions::new(),
            validators: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl TaskConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON configuration file
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let config = Self::from_json(&text)?;
        tracing::debug!(
            path = %path.display(),
            items = config.items.len(),
            "Loaded task configuration"
        );
        Ok(config)
    }

    /// Replay the configuration through a [`TaskBuilder`]
    pub fn into_builder(self) -> Result<TaskBuilder> {
        let mut builder = TaskBuilder::default();
        builder
            .batch(self.batch_size)?
            .retry(self.max_retries)?
            .throttle(self.throttle)?
            .options(self.options);

        if let Some(cache) = self.cache {
            builder.cache(cache.key_prefix, cache.time_to_live.as_secs());
        }
        for validator in self.validators {
            builder.push_validator(validator.into_validator()?);
        }
        for item in self.items {
            builder.try_add(item.id, item.url)?;
        }

        Ok(builder)
    }
}

fn default_batch_size() -> usize {
    1
}

fn default_max_retries() -> u32 {
    1
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
