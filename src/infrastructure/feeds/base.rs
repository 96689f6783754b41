//! Thin HTTP layer shared by the crawlers: browser-ish headers, bounded
//! retry, a minimum gap between requests and charset-aware decoding.

use super::FeedError;
use crate::infrastructure::encoding::decode_bytes;
use crate::infrastructure::retry::{with_retry, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; newspulse/0.1)";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RATE_GAP: Duration = Duration::from_secs(1);

pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
    min_gap: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, min_gap: Duration) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.8"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Config(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            min_gap,
            last_request: Mutex::new(None),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Waits until at least `min_gap` has passed since the previous request.
    pub async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_gap {
                let wait = self.min_gap - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiting feed request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Sends the request built by `build`, retrying transient failures.
    pub async fn send(
        &self,
        label: &str,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FeedError> {
        let build = &build;
        with_retry(self.retry, label, FeedError::is_retryable, || self.send_once(build)).await
    }

    async fn send_once(
        &self,
        build: &impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FeedError> {
        self.pace().await;
        let resp = build(&self.client).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        Ok(resp)
    }

    /// GET a page and decode it with the declared charset, falling back to detection.
    pub async fn get_text(&self, url: &str) -> Result<String, FeedError> {
        tracing::debug!(url, "Fetching page");
        let resp = self.send(url, |c| c.get(url)).await?;
        let charset = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);
        let bytes = resp.bytes().await?;
        Ok(decode_bytes(&bytes, charset.as_deref()))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let resp = self.send(url, |c| c.get(url).query(query)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }
}

fn charset_from_content_type(value: &str) -> Option<String> {
    value.split(';').find_map(|part| {
        let (key, val) = part.trim().split_once('=')?;
        key.eq_ignore_ascii_case("charset")
            .then(|| val.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=EUC-KR").as_deref(),
            Some("EUC-KR")
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=\"utf-8\"").as_deref(),
            Some("utf-8")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_enforces_min_gap() {
        let fetcher = HttpFetcher::new(DEFAULT_TIMEOUT, Duration::from_secs(2)).unwrap();
        let start = Instant::now();
        fetcher.pace().await;
        fetcher.pace().await;
        fetcher.pace().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }
}
