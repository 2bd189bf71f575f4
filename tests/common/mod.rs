//! Common test utilities for fetch-dl integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fetch_dl::{Downloader, HttpTransport, SqliteCache};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount a GET route answering `status` with `body`, expected to be hit `calls` times
pub async fn mount_page(server: &MockServer, route: &str, status: u16, body: &str, calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(calls)
        .mount(server)
        .await;
}

/// Downloader over HTTP with a fresh SQLite cache in a temporary directory
///
/// The returned [`TempDir`] must outlive the cache.
pub async fn sqlite_downloader() -> (Downloader, Arc<SqliteCache>, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let cache = Arc::new(
        SqliteCache::new(&dir.path().join("cache.db"))
            .await
            .expect("open sqlite cache"),
    );
    let downloader = Downloader::with_transport(cache.clone(), Arc::new(HttpTransport::new()));
    (downloader, cache, dir)
}
