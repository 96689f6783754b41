//! Textual and embedding-based near-duplicate detection.

use crate::domain::entities::content_item::ContentItem;
use crate::domain::ports::content_repository::RecentTitle;
use crate::domain::ports::vector_store::VectorHit;
use crate::domain::values::content_type::ContentType;
use crate::domain::values::title_similarity::similarity_ratio;
use chrono::Duration;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct DedupSettings {
    pub text_threshold: f64,
    pub lookback: Duration,
    pub embedding_skip_threshold: f64,
    pub embedding_medium_threshold: f64,
    pub embedding_top_k: usize,
    /// Content types compared only against identical titles from the same source.
    pub exempt_content_types: HashSet<ContentType>,
    pub notification_lookback: Duration,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            text_threshold: 0.8,
            lookback: Duration::hours(24),
            embedding_skip_threshold: 0.95,
            embedding_medium_threshold: 0.90,
            embedding_top_k: 3,
            exempt_content_types: HashSet::new(),
            notification_lookback: Duration::hours(4),
        }
    }
}

/// Title-similarity check against recently ingested titles.
#[derive(Debug, Clone)]
pub struct TextDeduplicator {
    threshold: f64,
    exempt: HashSet<ContentType>,
}

impl TextDeduplicator {
    pub fn new(settings: &DedupSettings) -> Self {
        Self {
            threshold: settings.text_threshold,
            exempt: settings.exempt_content_types.clone(),
        }
    }

    pub fn is_duplicate(&self, item: &ContentItem, recent: &[RecentTitle]) -> bool {
        let title = item.title.trim();
        if self.exempt.contains(&item.content_type) {
            return recent
                .iter()
                .any(|r| r.source == item.source && r.title.trim() == title);
        }
        recent.iter().any(|r| {
            let ratio = similarity_ratio(title, r.title.trim());
            if ratio >= self.threshold {
                tracing::debug!(ratio, existing = %r.title, "Similar title found");
                true
            } else {
                false
            }
        })
    }
}

/// Outcome of comparing an item's embedding with its recent same-ticker neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmbeddingVerdict {
    Unique,
    /// Close enough to log, not close enough to skip prediction.
    Medium { neighbour_id: i64, similarity: f64 },
    Duplicate { neighbour_id: i64, similarity: f64 },
}

impl EmbeddingVerdict {
    pub fn from_hits(hits: &[VectorHit], settings: &DedupSettings) -> Self {
        let Some(best) = hits
            .iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
        else {
            return EmbeddingVerdict::Unique;
        };
        if best.similarity >= settings.embedding_skip_threshold {
            EmbeddingVerdict::Duplicate {
                neighbour_id: best.content_item_id,
                similarity: best.similarity,
            }
        } else if best.similarity >= settings.embedding_medium_threshold {
            EmbeddingVerdict::Medium {
                neighbour_id: best.content_item_id,
                similarity: best.similarity,
            }
        } else {
            EmbeddingVerdict::Unique
        }
    }

    pub fn skips_prediction(&self) -> bool {
        matches!(self, EmbeddingVerdict::Duplicate { .. })
    }
}
