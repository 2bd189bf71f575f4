//! HTTP transport on top of `reqwest`.
//!
//! Every batch gets its own client, built from the task's options and dropped once
//! the batch completes, so no connection outlives the batch that opened it.
//!
//! Recognized options:
//!
//! | name               | value          | effect                                         |
//! |--------------------|----------------|------------------------------------------------|
//! | `timeout`          | seconds        | total per-request timeout                      |
//! | `connect_timeout`  | seconds        | connection timeout                             |
//! | `user_agent`       | string         | `User-Agent` header                            |
//! | `verify_tls`       | bool           | `false` accepts invalid certificates           |
//! | `follow_redirects` | bool           | `false` disables redirects                     |
//! | `max_redirects`    | integer        | redirect limit when following                  |
//! | `fail_on_error`    | bool           | treat non-2xx responses as failed fetches      |
//! | `header:<Name>`    | string         | extra request header                           |
//!
//! Unknown names are logged and ignored.

use std::time::Duration;

use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};
use crate::types::{ItemId, OptionValue, TransportOptions};

use super::{BatchResponses, FetchRequest, Transport};

const HEADER_PREFIX: &str = "header:";

/// Per-batch settings derived from [`TransportOptions`]
struct ClientSettings {
    client: reqwest::Client,
    fail_on_error: bool,
}

/// Production [`Transport`] issuing concurrent GET requests
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    defaults: TransportOptions,
}

impl HttpTransport {
    /// Transport with no default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose `defaults` apply unless a task overrides the same option
    pub fn with_defaults(defaults: TransportOptions) -> Self {
        Self { defaults }
    }

    fn build_client(&self, task_options: &TransportOptions) -> Result<ClientSettings> {
        let mut options = self.defaults.clone();
        options.extend(task_options.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut builder = reqwest::Client::builder();
        let mut headers = HeaderMap::new();
        let mut fail_on_error = false;
        let mut follow_redirects = true;
        let mut max_redirects: Option<usize> = None;

        for (name, value) in &options {
            match name.as_str() {
                "timeout" => builder = builder.timeout(seconds(name, value)?),
                "connect_timeout" => builder = builder.connect_timeout(seconds(name, value)?),
                "user_agent" => builder = builder.user_agent(string(name, value)?),
                "verify_tls" => {
                    builder = builder.danger_accept_invalid_certs(!boolean(name, value)?)
                }
                "follow_redirects" => follow_redirects = boolean(name, value)?,
                "max_redirects" => {
                    let n = match value {
                        OptionValue::Int(n) => usize::try_from(*n).ok(),
                        _ => None,
                    };
                    max_redirects = Some(n.ok_or_else(|| {
                        bad_option(name, "expects a non-negative integer", value)
                    })?);
                }
                "fail_on_error" => fail_on_error = boolean(name, value)?,
                other => match other.strip_prefix(HEADER_PREFIX) {
                    Some(header) => {
                        let header_name = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
                            bad_option(name, &format!("has an invalid header name: {}", e), value)
                        })?;
                        let header_value = HeaderValue::from_str(string(name, value)?).map_err(|e| {
                            bad_option(name, &format!("has an invalid header value: {}", e), value)
                        })?;
                        headers.insert(header_name, header_value);
                    }
                    None => {
                        tracing::warn!(option = other, "Ignoring unknown transport option");
                    }
                },
            }
        }

        let policy = match (follow_redirects, max_redirects) {
            (false, _) => reqwest::redirect::Policy::none(),
            (true, Some(max)) => reqwest::redirect::Policy::limited(max),
            (true, None) => reqwest::redirect::Policy::default(),
        };

        let client = builder
            .default_headers(headers)
            .redirect(policy)
            .build()
            .map_err(|e| Error::TransportInit(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ClientSettings {
            client,
            fail_on_error,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch_batch(
        &self,
        requests: &[FetchRequest],
        options: &TransportOptions,
    ) -> Result<BatchResponses> {
        let settings = self.build_client(options)?;

        let fetches = requests
            .iter()
            .map(|request| fetch_one(&settings, &request.id, &request.url));
        let bodies = join_all(fetches).await;

        // Dropping the client closes its pooled connections before the next batch.
        drop(settings);

        Ok(requests
            .iter()
            .map(|r| r.id.clone())
            .zip(bodies)
            .collect())
    }
}

async fn fetch_one(settings: &ClientSettings, id: &ItemId, url: &str) -> Option<String> {
    let parsed = match url::Url::parse(url) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(item_id = %id, url, error = %e, "Skipping request with invalid URL");
            return None;
        }
    };

    tracing::debug!(item_id = %id, url, "Sending request");

    let response = match settings.client.get(parsed).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(
                item_id = %id,
                url,
                error = %e,
                timeout = e.is_timeout(),
                connect = e.is_connect(),
                "Request failed"
            );
            return None;
        }
    };

    let status = response.status();
    if settings.fail_on_error && !status.is_success() {
        tracing::debug!(item_id = %id, url, status = status.as_u16(), "Rejecting error status");
        return None;
    }

    match response.text().await {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::debug!(item_id = %id, url, error = %e, "Failed to read response body");
            None
        }
    }
}

fn bad_option(name: &str, problem: &str, value: &OptionValue) -> Error {
    Error::TransportInit(format!(
        "transport option '{}' {} (got {})",
        name, problem, value
    ))
}

fn seconds(name: &str, value: &OptionValue) -> Result<Duration> {
    value
        .as_secs_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| bad_option(name, "expects a non-negative number of seconds", value))
}

fn boolean(name: &str, value: &OptionValue) -> Result<bool> {
    match value {
        OptionValue::Bool(b) => Ok(*b),
        _ => Err(bad_option(name, "expects a boolean", value)),
    }
}

fn string<'a>(name: &str, value: &'a OptionValue) -> Result<&'a str> {
    match value {
        OptionValue::Str(s) => Ok(s),
        _ => Err(bad_option(name, "expects a string", value)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(id: i64, url: String) -> FetchRequest {
        FetchRequest {
            id: ItemId::Int(id),
            url,
        }
    }

    fn opts(pairs: &[(&str, OptionValue)]) -> TransportOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn fetches_every_request_in_the_batch() {
        let server = MockServer::start().await;
        for name in ["a", "b", "c"] {
            Mock::given(method("GET"))
                .and(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("page {name}")))
                .expect(1)
                .mount(&server)
                .await;
        }

        let requests: Vec<_> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, name)| request(i as i64, format!("{}/{}", server.uri(), name)))
            .collect();

        let responses = HttpTransport::new()
            .fetch_batch(&requests, &TransportOptions::new())
            .await
            .unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[&ItemId::Int(0)].as_deref(), Some("page a"));
        assert_eq!(responses[&ItemId::Int(2)].as_deref(), Some("page c"));
    }

    #[tokio::test]
    async fn batch_requests_are_in_flight_together() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(400);
        let count = 6;
        for i in 0..count {
            Mock::given(method("GET"))
                .and(path(format!("/slow/{i}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(format!("slow {i}"))
                        .set_delay(delay),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let requests: Vec<_> = (0..count)
            .map(|i| request(i, format!("{}/slow/{}", server.uri(), i)))
            .collect();

        let started = std::time::Instant::now();
        let responses = HttpTransport::new()
            .fetch_batch(&requests, &TransportOptions::new())
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(responses.values().all(Option::is_some));
        // Sequential fetching would take count * delay (2.4s)
        assert!(
            elapsed < delay * 3,
            "batch took {:?}, requests were not concurrent",
            elapsed
        );
    }

    #[tokio::test]
    async fn error_status_body_is_returned_unless_fail_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;
        let requests = vec![request(1, format!("{}/missing", server.uri()))];
        let transport = HttpTransport::new();

        let lenient = transport
            .fetch_batch(&requests, &TransportOptions::new())
            .await
            .unwrap();
        assert_eq!(lenient[&ItemId::Int(1)].as_deref(), Some("not here"));

        let strict = transport
            .fetch_batch(&requests, &opts(&[("fail_on_error", true.into())]))
            .await
            .unwrap();
        assert_eq!(strict[&ItemId::Int(1)], None);
    }

    #[tokio::test]
    async fn unreachable_and_invalid_urls_yield_none() {
        let requests = vec![
            request(1, "not a url".to_string()),
            // Port 9 (discard) on localhost is reliably closed in test environments
            request(2, "http://127.0.0.1:9/".to_string()),
        ];

        let responses = HttpTransport::new()
            .fetch_batch(&requests, &opts(&[("connect_timeout", 2.into())]))
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[&ItemId::Int(1)], None);
        assert_eq!(responses[&ItemId::Int(2)], None);
    }

    #[tokio::test]
    async fn header_and_user_agent_options_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h"))
            .and(header("x-api-key", "secret"))
            .and(header("user-agent", "fetch-dl-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("authorized"))
            .mount(&server)
            .await;

        let options = opts(&[
            ("header:X-Api-Key", "secret".into()),
            ("user_agent", "fetch-dl-test".into()),
        ]);
        let responses = HttpTransport::new()
            .fetch_batch(&[request(1, format!("{}/h", server.uri()))], &options)
            .await
            .unwrap();

        assert_eq!(responses[&ItemId::Int(1)].as_deref(), Some("authorized"));
    }

    #[tokio::test]
    async fn task_options_override_transport_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header("user-agent", "task-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::with_defaults(opts(&[("user_agent", "default-agent".into())]));
        let responses = transport
            .fetch_batch(
                &[request(1, format!("{}/ua", server.uri()))],
                &opts(&[("user_agent", "task-agent".into())]),
            )
            .await
            .unwrap();

        assert_eq!(responses[&ItemId::Int(1)].as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn mistyped_option_fails_initialization() {
        let cases = [
            opts(&[("timeout", "soon".into())]),
            opts(&[("timeout", (-1).into())]),
            opts(&[("verify_tls", 1.into())]),
            opts(&[("max_redirects", (-3).into())]),
            opts(&[("header:Bad Name", "x".into())]),
        ];

        for options in cases {
            let err = HttpTransport::new()
                .fetch_batch(&[request(1, "http://127.0.0.1:9/".into())], &options)
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::TransportInit(_)),
                "{options:?} should fail, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_options_are_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;

        let responses = HttpTransport::new()
            .fetch_batch(
                &[request(1, server.uri())],
                &opts(&[("ssl_cipher_list", "DEFAULT".into())]),
            )
            .await
            .unwrap();

        assert_eq!(responses[&ItemId::Int(1)].as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn redirects_can_be_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new", server.uri()).as_str())
                    .set_body_string("moved"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("new home"))
            .mount(&server)
            .await;
        let requests = vec![request(1, format!("{}/old", server.uri()))];

        let followed = HttpTransport::new()
            .fetch_batch(&requests, &TransportOptions::new())
            .await
            .unwrap();
        assert_eq!(followed[&ItemId::Int(1)].as_deref(), Some("new home"));

        let pinned = HttpTransport::new()
            .fetch_batch(&requests, &opts(&[("follow_redirects", false.into())]))
            .await
            .unwrap();
        assert_eq!(pinned[&ItemId::Int(1)].as_deref(), Some("moved"));
    }
}
