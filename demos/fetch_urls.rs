//! Fetch URLs described by a JSON task file
//!
//! ```bash
//! cargo run --example fetch_urls -- task.json [cache.db]
//! ```
//!
//! Without a cache path the run is uncached. See `fetch_dl::config` for the file
//! format.

use std::path::PathBuf;
use std::sync::Arc;

use fetch_dl::{CacheStore, Downloader, NoCache, SqliteCache, TaskConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(task_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: fetch_urls <task.json> [cache.db]");
        std::process::exit(2);
    };

    let cache: Arc<dyn CacheStore> = match args.next() {
        Some(db) => Arc::new(SqliteCache::new(db.as_ref()).await?),
        None => Arc::new(NoCache),
    };

    let task = TaskConfig::load(&task_path).await?.into_builder()?.build();
    println!(
        "Fetching {} URL(s), {} at a time",
        task.item_count(),
        task.batch_size()
    );

    let results = Downloader::new(cache).execute(&task).await?;

    let mut ids: Vec<_> = results.keys().cloned().collect();
    ids.sort();
    for id in ids {
        let result = &results[&id];
        match result.content() {
            Ok(body) => println!("✓ {}: {} bytes", id, body.len()),
            Err(_) if result.skipped() => println!("- {}: throttled", id),
            Err(_) => println!("✗ {}: failed", id),
        }
    }

    Ok(())
}
