use crate::domain::entities::content_item::ContentItem;
use crate::domain::error::DomainError;
use crate::domain::values::content_type::ContentType;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub ticker: Option<String>,
    pub content_type: Option<ContentType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// A title ingested recently, as seen by the textual deduplicator.
#[derive(Debug, Clone)]
pub struct RecentTitle {
    pub title: String,
    pub source: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContentStats {
    pub total_items: usize,
    pub by_content_type: Vec<(String, usize)>,
    pub with_ticker: usize,
    pub notified: usize,
}

/// Decides, inside the insert transaction, whether the candidate duplicates a recent title.
pub type DuplicateCheck<'a> = &'a (dyn Fn(&ContentItem, &[RecentTitle]) -> bool + Sync);

pub trait ContentRepository: Send + Sync {
    /// Loads titles ingested since `since`, runs `is_duplicate`, and inserts the item
    /// in the same transaction. Returns the assigned id, or `None` for a duplicate.
    fn insert_if_novel(
        &self,
        item: &ContentItem,
        since: DateTime<Utc>,
        is_duplicate: DuplicateCheck<'_>,
    ) -> Result<Option<i64>, DomainError>;
    fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>, DomainError>;
    fn query(&self, filter: &ContentFilter) -> Result<Vec<ContentItem>, DomainError>;
    /// Ticker-bearing items ingested since `since` that have no embedding row.
    fn items_missing_embeddings(&self, since: DateTime<Utc>) -> Result<Vec<ContentItem>, DomainError>;
    /// Ticker-bearing items ingested since `since` lacking a prediction from at least one of `model_ids`.
    fn items_missing_predictions(&self, since: DateTime<Utc>, model_ids: &[i64]) -> Result<Vec<ContentItem>, DomainError>;
    /// Ticker-bearing items ingested since `since` that were never notified.
    fn unnotified_since(&self, since: DateTime<Utc>) -> Result<Vec<ContentItem>, DomainError>;
    /// Sets `notified_at` once; returns false when it was already set.
    fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<bool, DomainError>;
    fn was_notified(&self, id: i64) -> Result<bool, DomainError>;
    fn update_text(&self, id: i64, title: &str, body: &str) -> Result<(), DomainError>;
    fn delete(&self, id: i64) -> Result<(), DomainError>;
    fn all_ids(&self) -> Result<Vec<i64>, DomainError>;
    fn stats(&self) -> Result<ContentStats, DomainError>;
}
