//! Rate-limit-aware HTTP client pool for the upstream API.
//!
//! One reusable `reqwest::Client` per configured worker thread, picked
//! uniformly at random per request (clients are stateless, so no
//! exclusivity is needed). Every request runs through the same retry loop:
//! transient network failures back off exponentially, 429s honor
//! `Retry-After` when present, anything else non-200 is terminal.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use trackmirror_core::config::JiraConfig;
use trackmirror_core::Cancel;

use crate::backoff::BackoffPolicy;
use crate::models::{JiraProject, SearchResponse};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request cancelled")]
    Cancelled,
    #[error("retries exhausted: {0}")]
    RetriesExhausted(#[source] reqwest::Error),
    #[error("rate limited and retries exhausted")]
    RateLimited,
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

pub struct JiraClient {
    base_url: String,
    pool: Vec<reqwest::Client>,
    backoff: BackoffPolicy,
}

impl JiraClient {
    pub fn new(cfg: &JiraConfig) -> Result<Self, reqwest::Error> {
        let pool = (0..cfg.thread_count.max(1))
            .map(|_| {
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(cfg.timeout_secs))
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            pool,
            backoff: BackoffPolicy::new(
                Duration::from_millis(cfg.min_sleep_ms),
                Duration::from_millis(cfg.max_sleep_ms),
                cfg.max_attempts,
            ),
        })
    }

    // ── Call shapes ─────────────────────────────────────────────

    /// List every project visible on the upstream instance.
    pub async fn list_projects(&self, cancel: &Cancel) -> Result<Vec<JiraProject>, FetchError> {
        let url = format!("{}/rest/api/2/project", self.base_url);
        self.fetch(&url, cancel).await
    }

    /// One page of a project's issues with embedded changelog.
    pub async fn search_issues(
        &self,
        project_key: &str,
        start_at: u64,
        max_results: u64,
        cancel: &Cancel,
    ) -> Result<SearchResponse, FetchError> {
        let url = self.search_url(project_key, start_at, max_results);
        self.fetch(&url, cancel).await
    }

    /// Total issue count for a project: the same search with a zero page.
    pub async fn issue_count(&self, project_key: &str, cancel: &Cancel) -> Result<u64, FetchError> {
        let url = self.count_url(project_key);
        let resp: SearchResponse = self.fetch(&url, cancel).await?;
        Ok(resp.total)
    }

    fn search_url(&self, project_key: &str, start_at: u64, max_results: u64) -> String {
        format!(
            "{}/rest/api/2/search?jql=project={}&startAt={}&maxResults={}&expand=changelog",
            self.base_url, project_key, start_at, max_results
        )
    }

    fn count_url(&self, project_key: &str) -> String {
        format!(
            "{}/rest/api/2/search?jql=project={}&maxResults=0",
            self.base_url, project_key
        )
    }

    // ── Retry loop ──────────────────────────────────────────────

    fn client(&self) -> &reqwest::Client {
        let index = rand::thread_rng().gen_range(0..self.pool.len());
        &self.pool[index]
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, cancel: &Cancel) -> Result<T, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            // Abandon the in-flight request the moment the run is cancelled
            // instead of letting it ride out the request timeout.
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                sent = self.client().get(url).send() => sent,
            };

            let response = match sent {
                Ok(resp) => resp,
                Err(err) => {
                    let Some(delay) = self.backoff.delay(attempt) else {
                        return Err(FetchError::RetriesExhausted(err));
                    };
                    warn!(%url, %err, attempt, ?delay, "network error, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                // A server-directed delay does not consume a backoff attempt.
                if let Some(secs) = retry_after_secs(response.headers()) {
                    debug!(%url, secs, "rate limited, honoring Retry-After");
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    continue;
                }
                let Some(delay) = self.backoff.delay(attempt) else {
                    return Err(FetchError::RateLimited);
                };
                warn!(%url, attempt, ?delay, "rate limited without Retry-After, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return response.json::<T>().await.map_err(FetchError::Decode);
        }
    }
}

/// Parse an integer `Retry-After` header (seconds). HTTP-date values are
/// ignored and fall through to the backoff policy.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn test_client() -> JiraClient {
        JiraClient::new(&JiraConfig {
            base_url: "https://issues.example.org/".to_string(),
            page_size: 50,
            thread_count: 2,
            min_sleep_ms: 10,
            max_sleep_ms: 100,
            max_attempts: 3,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = test_client();
        assert_eq!(
            client.search_url("KAFKA", 100, 50),
            "https://issues.example.org/rest/api/2/search?jql=project=KAFKA&startAt=100&maxResults=50&expand=changelog"
        );
    }

    #[test]
    fn count_url_requests_zero_page() {
        let client = test_client();
        assert_eq!(
            client.count_url("HADOOP"),
            "https://issues.example.org/rest/api/2/search?jql=project=HADOOP&maxResults=0"
        );
    }

    #[test]
    fn pool_width_matches_thread_count() {
        assert_eq!(test_client().pool.len(), 2);
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after_secs(&headers), Some(2));
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_secs(&headers), None);
        assert_eq!(retry_after_secs(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn cancelled_fetch_returns_immediately() {
        let client = test_client();
        let cancel = Cancel::new();
        cancel.cancel();
        let res: Result<SearchResponse, _> = client
            .fetch("https://issues.example.org/rest/api/2/search", &cancel)
            .await;
        assert!(matches!(res, Err(FetchError::Cancelled)));
    }

    // ── Retry loop against a local stub server ──────────────────

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn http_response(status_line: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serve one canned reply per connection, then `{"total":0}` forever.
    /// Returns the base URL and a hit counter.
    async fn stub_server(replies: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            let mut replies = replies.into_iter();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies
                    .next()
                    .unwrap_or_else(|| http_response("200 OK", "", r#"{"total":0}"#));
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        (base_url, hits)
    }

    fn stub_config(base_url: String, max_attempts: u32) -> JiraConfig {
        JiraConfig {
            base_url,
            page_size: 50,
            thread_count: 1,
            min_sleep_ms: 10,
            max_sleep_ms: 1000,
            max_attempts,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn retry_after_pauses_without_consuming_attempts() {
        // max_attempts = 0: any consultation of the backoff policy would be
        // terminal, so completing after two 429s proves the server-directed
        // delay path never touches the attempt counter.
        let rate_limited = http_response("429 Too Many Requests", "Retry-After: 1\r\n", "");
        let (base_url, hits) =
            stub_server(vec![rate_limited.clone(), rate_limited, http_response("200 OK", "", r#"{"total":7}"#)])
                .await;
        let client = JiraClient::new(&stub_config(base_url, 0)).unwrap();

        let started = Instant::now();
        let total = client.issue_count("KAFKA", &Cancel::new()).await.unwrap();

        assert_eq!(total, 7);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn rate_limit_without_header_falls_back_to_backoff() {
        let (base_url, hits) = stub_server(vec![
            http_response("429 Too Many Requests", "", ""),
            http_response("200 OK", "", r#"{"total":3}"#),
        ])
        .await;
        let client = JiraClient::new(&stub_config(base_url, 2)).unwrap();

        let total = client.issue_count("KAFKA", &Cancel::new()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_without_header_is_terminal_once_exhausted() {
        let (base_url, hits) =
            stub_server(vec![http_response("429 Too Many Requests", "", "")]).await;
        let client = JiraClient::new(&stub_config(base_url, 0)).unwrap();

        let err = client.issue_count("KAFKA", &Cancel::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_errors_exhaust_into_terminal_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = JiraClient::new(&stub_config(base_url, 2)).unwrap();
        let started = Instant::now();
        let err = client.issue_count("KAFKA", &Cancel::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::RetriesExhausted(_)));
        // Two consumed attempts: 10ms + 20ms of backoff before giving up.
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn non_200_is_terminal_and_not_retried() {
        let (base_url, hits) =
            stub_server(vec![http_response("500 Internal Server Error", "", "boom")]).await;
        let client = JiraClient::new(&stub_config(base_url, 3)).unwrap();

        let err = client.issue_count("KAFKA", &Cancel::new()).await.unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_terminal() {
        let (base_url, hits) =
            stub_server(vec![http_response("200 OK", "", "not json")]).await;
        let client = JiraClient::new(&stub_config(base_url, 3)).unwrap();

        let err = client.issue_count("KAFKA", &Cancel::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_aborts_an_in_flight_request() {
        // Accept and read but never respond, so the request stays in flight
        // far longer than the cancellation below.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });

        let client = JiraClient::new(&stub_config(base_url, 3)).unwrap();
        let cancel = Cancel::new();
        let task_cancel = cancel.clone();
        let handle =
            tokio::spawn(async move { client.issue_count("KAFKA", &task_cancel).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        // Well under the 5s request timeout: the select must have fired.
        let res = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("fetch did not abort on cancel")
            .unwrap();
        assert!(matches!(res, Err(FetchError::Cancelled)));
    }
}
