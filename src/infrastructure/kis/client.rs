use super::rate_limiter::SlidingWindowLimiter;
use crate::infrastructure::retry::with_retry;
use super::token::TokenManager;
use super::{KisConfig, KisError};
use crate::domain::ports::cache::KeyValueCache;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Rate-limited, retrying KIS REST client.
#[derive(Clone)]
pub struct KisClient {
    http: reqwest::Client,
    config: KisConfig,
    limiter: Arc<SlidingWindowLimiter>,
    tokens: Arc<TokenManager>,
}

impl std::fmt::Debug for KisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KisClient")
            .field("base_url", &self.config.base_url)
            .field("max_requests", &self.config.max_requests)
            .finish_non_exhaustive()
    }
}

impl KisClient {
    pub fn new(config: KisConfig, cache: Arc<dyn KeyValueCache>) -> Result<Self, KisError> {
        let tokens = TokenManager::shared(&config, cache);
        let limiter = Arc::new(SlidingWindowLimiter::new(config.max_requests, config.window));
        Self::with_parts(config, limiter, tokens)
    }

    /// Builds a client around an existing limiter and token owner, so several
    /// clients can share one quota.
    pub fn with_parts(
        config: KisConfig,
        limiter: Arc<SlidingWindowLimiter>,
        tokens: Arc<TokenManager>,
    ) -> Result<Self, KisError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KisError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            limiter,
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub async fn get(&self, endpoint: &str, tr_id: &str, query: &[(&str, String)]) -> Result<Value, KisError> {
        self.request(Method::GET, endpoint, tr_id, query, None).await
    }

    /// Sends one API call, retrying transient failures per the configured policy.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        tr_id: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, KisError> {
        with_retry(self.config.retry, tr_id, KisError::is_retryable, || {
            self.send_once(method.clone(), endpoint, tr_id, query, body)
        })
        .await
    }

    async fn send_once(
        &self,
        method: Method,
        endpoint: &str,
        tr_id: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, KisError> {
        self.limiter.acquire().await;
        let token = self.tokens.access_token().await?;

        let url = format!("{}{}", self.config.base_url, endpoint);
        let mut req = self
            .http
            .request(method, &url)
            .header("content-type", "application/json; charset=utf-8")
            .bearer_auth(token)
            .header("appkey", &self.config.app_key)
            .header("appsecret", &self.config.app_secret)
            .header("tr_id", tr_id)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(KisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| KisError::Parse(format!("{tr_id}: {e}")))?;
        check_envelope(json)
    }
}

/// Accepts the body only when `rt_cd == "0"`.
pub fn check_envelope(json: Value) -> Result<Value, KisError> {
    match json.get("rt_cd").and_then(|v| v.as_str()) {
        Some("0") => Ok(json),
        code => Err(KisError::Provider {
            code: code.unwrap_or("missing").to_string(),
            message: format!(
                "{} {}",
                json.get("msg_cd").and_then(|v| v.as_str()).unwrap_or_default(),
                json.get("msg1").and_then(|v| v.as_str()).unwrap_or_default()
            )
            .trim()
            .to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_accepts_success() {
        let body = serde_json::json!({"rt_cd": "0", "output": {"stck_prpr": "59000"}});
        assert!(check_envelope(body).is_ok());
    }

    #[test]
    fn test_envelope_rejects_logical_error() {
        let body = serde_json::json!({"rt_cd": "1", "msg_cd": "EGW00201", "msg1": "초당 거래건수를 초과하였습니다."});
        match check_envelope(body) {
            Err(KisError::Provider { code, message }) => {
                assert_eq!(code, "1");
                assert!(message.starts_with("EGW00201"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_error_is_fatal() {
        let e = KisError::Provider {
            code: "1".into(),
            message: String::new(),
        };
        assert!(!e.is_retryable());
        assert!(KisError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(KisError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!KisError::Status { status: 404, body: String::new() }.is_retryable());
    }
}
