pub mod base;
pub mod dart;
pub mod naver_news;
pub mod naver_search;
pub mod reddit;

use crate::domain::entities::content_item::ContentItem;
use crate::domain::error::DomainError;
use async_trait::async_trait;

/// A content source that produces items ready for ingestion.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Stable feed id, also used by `ingest <feed>`.
    fn name(&self) -> &str;

    /// Fetch up to `limit` of the most recent items.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ContentItem>, FeedError>;
}

#[derive(Debug)]
pub enum FeedError {
    /// HTTP or network error
    Network(String),
    /// Non-success HTTP status
    Status(u16),
    /// Response parsing error
    Parse(String),
    /// Configuration error (missing API key, etc.)
    Config(String),
}

impl FeedError {
    /// Network errors and 429/5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Network(_) => true,
            FeedError::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Network(msg) => write!(f, "Network error: {msg}"),
            FeedError::Status(code) => write!(f, "HTTP status {code}"),
            FeedError::Parse(msg) => write!(f, "Parse error: {msg}"),
            FeedError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FeedError::Status(status.as_u16()),
            None => FeedError::Network(e.to_string()),
        }
    }
}

impl From<FeedError> for DomainError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::Network(msg) => DomainError::Network(msg),
            FeedError::Status(code) => DomainError::Network(format!("HTTP status {code}")),
            FeedError::Parse(msg) => DomainError::Parse(msg),
            FeedError::Config(msg) => DomainError::Config(msg),
        }
    }
}

/// Outcome of one ingestion pass over a feed.
#[derive(Debug, Default, serde::Serialize)]
pub struct FeedResult {
    pub feed_name: String,
    pub entries_fetched: usize,
    pub entries_added: usize,
    pub entries_deduped: usize,
    /// Dropped because the title could not be repaired.
    pub entries_dropped: usize,
    pub errors: Vec<String>,
}

impl FeedResult {
    pub fn new(feed_name: &str) -> Self {
        Self {
            feed_name: feed_name.to_string(),
            ..Default::default()
        }
    }
}
