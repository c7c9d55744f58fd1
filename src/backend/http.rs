//! HTTP implementation of the blob/item store
//!
//! Every request passes through the shared [`RateLimiter`]: wait for the
//! quota window if it was exhausted, issue the request, record the quota
//! headers from the response. "Slow down" responses (429) are retried in
//! a bounded loop using the delay the backend reports.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;

use crate::config::Config;
use crate::observability::Logger;

use super::errors::{BackendError, BackendResult};
use super::rate_limit::RateLimiter;
use super::store::BlobStore;
use super::types::{ContainerInfo, Item, QuotaHeaders};

/// Attempts per request before giving up on a throttling backend
const MAX_THROTTLE_RETRIES: usize = 8;

/// Fallback delay when a 429 carries no usable retry hint
const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Remote store client backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpStore {
    http: Client,
    base_url: String,
    token: String,
    space: String,
    limiter: RateLimiter,
}

impl HttpStore {
    /// Creates a store from the given configuration with a fresh limiter
    pub fn new(config: &Config) -> Self {
        Self::with_limiter(config, RateLimiter::new())
    }

    /// Creates a store sharing an existing rate limiter
    pub fn with_limiter(config: &Config, limiter: RateLimiter) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            space: config.space.clone(),
            limiter,
        }
    }

    /// Returns a handle to the shared rate limiter
    pub fn limiter(&self) -> RateLimiter {
        self.limiter.clone()
    }

    fn containers_url(&self) -> String {
        format!("{}/spaces/{}/containers", self.base_url, self.space)
    }

    fn items_url(&self, container: &str) -> String {
        format!("{}/containers/{}/items", self.base_url, container)
    }

    fn item_url(&self, container: &str, item: &str) -> String {
        format!("{}/containers/{}/items/{}", self.base_url, container, item)
    }

    /// Issues a request under the rate limiter, retrying bounded on 429.
    ///
    /// The closure rebuilds the request for every attempt, so request
    /// bodies (including multipart forms) are reconstructed rather than
    /// cloned.
    async fn execute<F>(&self, make_request: F) -> BackendResult<reqwest::Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        for _ in 0..MAX_THROTTLE_RETRIES {
            self.limiter.await_ready().await;

            let response = make_request(&self.http)
                .header("Authorization", format!("Bearer {}", self.token))
                .send()
                .await?;

            let quota = quota_from_headers(response.headers());
            self.limiter.record_response(&quota);

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let delay = throttle_delay(&quota, response).await;
                Logger::warn(
                    "BACKEND_THROTTLED",
                    &[("retry_after_seconds", &format!("{:.3}", delay))],
                );
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Status { status, body });
            }

            return Ok(response);
        }
        Err(BackendError::RetriesExhausted(MAX_THROTTLE_RETRIES))
    }

    async fn execute_json<T, F>(&self, make_request: F) -> BackendResult<T>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.execute(make_request).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl BlobStore for HttpStore {
    async fn list_containers(&self) -> BackendResult<Vec<ContainerInfo>> {
        let url = self.containers_url();
        self.execute_json(|http| http.get(&url)).await
    }

    async fn create_container(&self, name: &str) -> BackendResult<ContainerInfo> {
        let url = self.containers_url();
        let body = json!({ "name": name });
        self.execute_json(|http| http.post(&url).json(&body)).await
    }

    async fn list_items(
        &self,
        container: &str,
        limit: u8,
        before: Option<&str>,
    ) -> BackendResult<Vec<Item>> {
        let url = self.items_url(container);
        let limit = limit.to_string();
        self.execute_json(|http| {
            let mut request = http.get(&url).query(&[("limit", limit.as_str())]);
            if let Some(cursor) = before {
                request = request.query(&[("before", cursor)]);
            }
            request
        })
        .await
    }

    async fn create_item(&self, container: &str, content: &str) -> BackendResult<Item> {
        let url = self.items_url(container);
        let body = json!({ "content": content });
        self.execute_json(|http| http.post(&url).json(&body)).await
    }

    async fn create_attachment_item(
        &self,
        container: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> BackendResult<Item> {
        let url = self.items_url(container);
        self.execute_json(|http| {
            let part =
                reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.to_string());
            let form = reqwest::multipart::Form::new().part(filename.to_string(), part);
            http.post(&url).multipart(form)
        })
        .await
    }

    async fn get_item(&self, container: &str, item: &str) -> BackendResult<Item> {
        let url = self.item_url(container, item);
        self.execute_json(|http| http.get(&url))
            .await
            .map_err(|e| missing_item(e, item))
    }

    async fn patch_item(&self, container: &str, item: &str, content: &str) -> BackendResult<Item> {
        let url = self.item_url(container, item);
        let body = json!({ "content": content });
        self.execute_json(|http| http.patch(&url).json(&body))
            .await
            .map_err(|e| missing_item(e, item))
    }

    async fn delete_item(&self, container: &str, item: &str) -> BackendResult<()> {
        let url = self.item_url(container, item);
        self.execute(|http| http.delete(&url))
            .await
            .map_err(|e| missing_item(e, item))?;
        Ok(())
    }

    async fn get_attachment(&self, url: &str) -> BackendResult<Vec<u8>> {
        let response = self.execute(|http| http.get(url)).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// A 404 on an item URL means the item is gone; callers get the same
/// error the in-memory store raises, not a raw status.
fn missing_item(err: BackendError, item: &str) -> BackendError {
    match err {
        BackendError::Status { status: 404, .. } => BackendError::ItemNotFound(item.to_string()),
        other => other,
    }
}

fn quota_from_headers(headers: &HeaderMap) -> QuotaHeaders {
    QuotaHeaders {
        remaining: header_value(headers, "x-ratelimit-remaining"),
        reset_unix: header_value(headers, "x-ratelimit-reset"),
        retry_after: header_value(headers, "retry-after"),
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Extracts the retry delay from a 429 response: body `retry_after`
/// first, then the header, then a fixed fallback.
async fn throttle_delay(quota: &QuotaHeaders, response: reqwest::Response) -> f64 {
    let from_body = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("retry_after").and_then(|v| v.as_f64()));
    from_body
        .or(quota.retry_after)
        .unwrap_or(DEFAULT_RETRY_DELAY_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection, then stops accepting
    async fn spawn_fixture(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&chunk[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}", addr)
    }

    fn response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn throttled() -> String {
        // A zero delay keeps the retry loop fast under test
        response("429 Too Many Requests", r#"{"retry_after":0}"#)
    }

    fn store_for(base_url: &str) -> HttpStore {
        HttpStore::new(&Config {
            base_url: base_url.to_string(),
            token: "tkn".to_string(),
            space: "spc".to_string(),
        })
    }

    #[tokio::test]
    async fn test_throttling_past_the_budget_fails() {
        let base_url = spawn_fixture(vec![throttled(); 10]).await;
        let store = store_for(&base_url);

        let err = store.list_containers().await.unwrap_err();
        assert!(matches!(err, BackendError::RetriesExhausted(8)));
    }

    #[tokio::test]
    async fn test_throttle_then_success_recovers() {
        let base_url = spawn_fixture(vec![throttled(), response("200 OK", "[]")]).await;
        let store = store_for(&base_url);

        let containers = store.list_containers().await.unwrap();
        assert!(containers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_item_maps_to_dedicated_error() {
        let base_url = spawn_fixture(vec![response("404 Not Found", "{}")]).await;
        let store = store_for(&base_url);

        let err = store.get_item("ctr-1", "itm-1").await.unwrap_err();
        assert!(matches!(err, BackendError::ItemNotFound(id) if id == "itm-1"));
    }

    #[test]
    fn test_missing_item_passes_other_statuses_through() {
        let err = missing_item(
            BackendError::Status {
                status: 500,
                body: String::new(),
            },
            "itm-1",
        );
        assert!(matches!(err, BackendError::Status { status: 500, .. }));

        let err = missing_item(
            BackendError::Status {
                status: 404,
                body: String::new(),
            },
            "itm-1",
        );
        assert!(matches!(err, BackendError::ItemNotFound(id) if id == "itm-1"));
    }
}
