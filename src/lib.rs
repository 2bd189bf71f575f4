//! # fetch-dl
//!
//! Bounded-concurrency URL fetcher for Rust applications.
//!
//! Given a set of `(id, url)` pairs, fetch-dl retrieves every URL while:
//! - keeping at most `batch_size` requests in flight,
//! - retrying rejected responses up to `max_retries` attempts,
//! - running caller-supplied validators before accepting a body,
//! - caching accepted bodies for a time-to-live,
//! - writing a "poison" marker for items that exhausted their retries, so later
//!   runs skip them for a throttle period instead of hammering a broken URL.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetch_dl::{Downloader, SqliteCache, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(SqliteCache::new("cache/fetch.db".as_ref()).await?);
//!     let downloader = Downloader::new(cache);
//!
//!     let mut builder = Task::builder();
//!     builder
//!         .batch(12)?
//!         .retry(2)?
//!         .throttle(300)?
//!         .cache("pages.", 3600)
//!         .option("timeout", 10)
//!         .validate(|body, _id, _url| body.contains("</html>"));
//!     for (id, url) in [(1, "https://example.com/"), (2, "https://example.org/")] {
//!         builder.add(id, url);
//!     }
//!
//!     for (id, result) in downloader.execute(&builder.build()).await? {
//!         match result.content() {
//!             Ok(body) => println!("{id}: {} bytes", body.len()),
//!             Err(_) if result.skipped() => println!("{id}: throttled"),
//!             Err(_) => println!("{id}: failed"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cache stores (memo and throttle)
pub mod cache;
/// Declarative task configuration
pub mod config;
/// The fetch engine
pub mod downloader;
/// Error types
pub mod error;
/// Task plans and their builder
pub mod task;
/// Batch transports
pub mod transport;
/// Core types
pub mod types;
/// Built-in response validators
pub mod validators;

// Re-export commonly used types
pub use cache::{CacheLookup, CacheStore, MemoryCache, NoCache, SqliteCache};
pub use config::{CacheConfig, ItemConfig, TaskConfig, ValidatorConfig};
pub use downloader::Downloader;
pub use error::{CacheError, Error, Result};
pub use task::{Task, TaskBuilder, Validator};
pub use transport::{BatchResponses, FetchRequest, HttpTransport, Transport};
pub use types::{FetchResult, ItemId, OptionValue, TransportOptions};
