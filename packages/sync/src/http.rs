//! Shared HTTP plumbing for upstream APIs
//!
//! Every request goes through [`ApiClient::execute`]: a per-request timeout
//! from the settings, and on `429 Too Many Requests` one retry after the
//! `Retry-After` delay. A second 429 gives up with `UpstreamUnavailable`.

use crate::error::SyncError;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Wait used when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    service: &'static str,
}

impl ApiClient {
    pub fn new(service: &'static str, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::upstream(service, format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, service })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Send a request built by `build`, retrying once on 429
    ///
    /// `build` is called again for the retry. Statuses other than 429 are
    /// returned to the caller untouched.
    pub async fn execute<F>(&self, build: F) -> Result<Response, SyncError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        match self.execute_once(&build).await {
            Err(SyncError::RateLimited {
                retry_after_secs, ..
            }) => {
                tracing::warn!(
                    service = self.service,
                    wait_secs = retry_after_secs,
                    "rate limited, retrying once"
                );
                tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                match self.execute_once(&build).await {
                    Err(SyncError::RateLimited { .. }) => Err(SyncError::upstream(
                        self.service,
                        "still rate limited after retry",
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn execute_once<F>(&self, build: &F) -> Result<Response, SyncError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = build(&self.client)
            .send()
            .await
            .map_err(|e| SyncError::upstream(self.service, e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(SyncError::RateLimited {
                service: self.service,
                retry_after_secs,
            });
        }

        Ok(response)
    }

    /// [`execute`](Self::execute), then require success and decode JSON
    pub async fn json<T, F>(&self, build: F) -> Result<T, SyncError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.execute(build).await?;
        self.decode(response).await
    }

    pub async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SyncError::upstream(
                self.service,
                format!("{} returned HTTP {}: {}", url, status.as_u16(), snippet),
            ));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::decode(self.service, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> ApiClient {
        ApiClient::new("test", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_retries_once_after_429() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/thing")
            .match_header("x-attempt", "1")
            .with_status(429)
            .with_header("Retry-After", "0")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/thing")
            .match_header("x-attempt", "2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/thing", server.url());
        let attempts = AtomicUsize::new(0);
        let value: Value = client()
            .json(|c| {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                c.get(&url).header("x-attempt", n.to_string())
            })
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_second_429_gives_up() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/thing")
            .with_status(429)
            .with_header("Retry-After", "0")
            .expect(2)
            .create_async()
            .await;
        let url = format!("{}/thing", server.url());

        let err = client().execute(|c| c.get(&url)).await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable { .. }));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let url = format!("{}/broken", server.url());

        let err = client().json::<Value, _>(|c| c.get(&url)).await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamUnavailable { ref message, .. } if message.contains("500")));
    }

    #[tokio::test]
    async fn test_bad_json_is_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;
        let url = format!("{}/garbage", server.url());

        let err = client().json::<Value, _>(|c| c.get(&url)).await.unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
    }
}
