use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

/// One embedded content item. Keyed by `content_item_id`.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub content_item_id: i64,
    pub vector: Vec<f32>,
    pub ticker_code: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub content_item_id: i64,
    pub ticker_code: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Euclidean distance to the query vector.
    pub distance: f64,
    /// `1 / (1 + distance)`.
    pub similarity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VectorQuery<'a> {
    pub ticker: Option<&'a str>,
    pub published_since: Option<DateTime<Utc>>,
    pub exclude_id: Option<i64>,
    /// Only records whose content item id is below this one (ingested earlier).
    pub before_id: Option<i64>,
    pub limit: usize,
}

pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the record for its content item.
    fn upsert(&self, record: &EmbeddingRecord) -> Result<(), DomainError>;
    /// Nearest records by L2 distance, closest first.
    fn search(&self, vector: &[f32], query: &VectorQuery<'_>) -> Result<Vec<VectorHit>, DomainError>;
    fn has_vector(&self, content_item_id: i64) -> Result<bool, DomainError>;
    fn delete(&self, content_item_id: i64) -> Result<(), DomainError>;
    fn count(&self) -> Result<usize, DomainError>;
    fn stored_dimension(&self) -> Result<Option<usize>, DomainError>;
}
