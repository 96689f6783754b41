//! Korea Investment & Securities (KIS) open API client.
//!
//! Every call goes through one sliding-window rate limiter and one shared
//! bearer token, and transient failures are retried with exponential backoff.

pub mod client;
pub mod market_data;
pub mod rate_limiter;
pub mod token;

use crate::domain::error::DomainError;
use crate::infrastructure::retry::RetryPolicy;
use std::time::Duration;
use thiserror::Error;

pub const KIS_SANDBOX_URL: &str = "https://openapivts.koreainvestment.com:29443";
pub const KIS_PROD_URL: &str = "https://openapi.koreainvestment.com:9443";

#[derive(Debug, Error)]
pub enum KisError {
    /// Transport failure: connect error, timeout, broken body.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 200 with `rt_cd != "0"`.
    #[error("KIS error {code}: {message}")]
    Provider { code: String, message: String },

    #[error("token error: {0}")]
    Token(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl KisError {
    /// 429, 5xx and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            KisError::Http(_) => true,
            KisError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for KisError {
    fn from(e: reqwest::Error) -> Self {
        KisError::Http(e.to_string())
    }
}

impl From<KisError> for DomainError {
    fn from(e: KisError) -> Self {
        match e {
            KisError::Http(msg) => DomainError::Network(msg),
            KisError::Status { status, body } => DomainError::Network(format!("HTTP {status}: {body}")),
            KisError::Provider { code, message } => DomainError::Provider(format!("{code}: {message}")),
            KisError::Token(msg) => DomainError::Provider(format!("token: {msg}")),
            KisError::Parse(msg) => DomainError::Parse(msg),
        }
    }
}

/// Connection settings for one KIS account.
#[derive(Debug, Clone)]
pub struct KisConfig {
    pub app_key: String,
    pub app_secret: String,
    pub base_url: String,
    pub max_requests: usize,
    pub window: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl KisConfig {
    /// Paper-trading environment: 5 requests per second.
    pub fn sandbox(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            base_url: KIS_SANDBOX_URL.to_string(),
            max_requests: 5,
            window: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Live environment: 20 requests per second.
    pub fn production(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            base_url: KIS_PROD_URL.to_string(),
            max_requests: 20,
            ..Self::sandbox(app_key, app_secret)
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }
}
