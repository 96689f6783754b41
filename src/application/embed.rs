use crate::application::dedup::{DedupSettings, EmbeddingVerdict};
use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::market_data::PriceChanges;
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::ContentRepository;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::ports::vector_store::{EmbeddingRecord, VectorHit, VectorQuery, VectorStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const RECONCILE_BATCH: usize = 100;

/// A retrieved neighbour with the price reaction that followed it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimilarItem {
    pub item: ContentItem,
    pub similarity: f64,
    pub price_changes: Option<PriceChanges>,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ReconcileReport {
    pub candidates: usize,
    pub embedded: usize,
    pub failed: usize,
}

pub struct EmbedUseCase {
    content_repo: Arc<dyn ContentRepository>,
    market_repo: Arc<dyn MarketDataRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    settings: DedupSettings,
}

impl EmbedUseCase {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        market_repo: Arc<dyn MarketDataRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        settings: DedupSettings,
    ) -> Self {
        Self {
            content_repo,
            market_repo,
            embedder,
            vector_store,
            settings,
        }
    }

    /// `None` when the provider is disabled (it returns no vectors).
    pub async fn embed_text(&self, text: &str, input_type: InputType) -> Result<Option<Vec<f32>>, DomainError> {
        let mut vectors = self
            .embedder
            .embed(&[text.to_string()], input_type)
            .await?;
        Ok(vectors.pop().filter(|v| !v.is_empty()))
    }

    /// Embeds a persisted, ticker-bearing item and upserts its vector.
    pub async fn index(&self, item: &ContentItem) -> Result<Option<Vec<f32>>, DomainError> {
        if !item.is_persisted() || item.ticker.is_none() {
            return Ok(None);
        }
        let Some(vector) = self.embed_text(&item.searchable_text(), InputType::Document).await? else {
            return Ok(None);
        };
        self.store(item, &vector)?;
        Ok(Some(vector))
    }

    fn store(&self, item: &ContentItem, vector: &[f32]) -> Result<(), DomainError> {
        self.vector_store.upsert(&EmbeddingRecord {
            content_item_id: item.id,
            vector: vector.to_vec(),
            ticker_code: item.ticker.clone(),
            published_at: item.published_at,
        })
    }

    /// Closest same-ticker neighbours within the dedup lookback, excluding the item.
    /// With `past_only`, only items ingested before it are considered.
    fn recent_neighbours(
        &self,
        item: &ContentItem,
        vector: &[f32],
        now: DateTime<Utc>,
        past_only: bool,
    ) -> Result<Vec<VectorHit>, DomainError> {
        self.vector_store.search(
            vector,
            &VectorQuery {
                ticker: item.ticker.as_deref(),
                published_since: Some(now - self.settings.lookback),
                exclude_id: Some(item.id),
                before_id: past_only.then_some(item.id),
                limit: self.settings.embedding_top_k,
            },
        )
    }

    pub fn embedding_verdict(&self, item: &ContentItem, vector: &[f32]) -> Result<EmbeddingVerdict, DomainError> {
        let hits = self.recent_neighbours(item, vector, Utc::now(), true)?;
        let verdict = EmbeddingVerdict::from_hits(&hits, &self.settings);
        match verdict {
            EmbeddingVerdict::Duplicate { neighbour_id, similarity } => tracing::info!(
                item_id = item.id,
                neighbour_id,
                similarity,
                "Near-duplicate embedding, skipping prediction"
            ),
            EmbeddingVerdict::Medium { neighbour_id, similarity } => tracing::info!(
                item_id = item.id,
                neighbour_id,
                similarity,
                "Medium embedding similarity"
            ),
            EmbeddingVerdict::Unique => {}
        }
        Ok(verdict)
    }

    /// Id of a near-identical same-ticker item notified within the notification lookback.
    pub async fn notified_neighbour(&self, item: &ContentItem) -> Result<Option<i64>, DomainError> {
        let Some(vector) = self.embed_text(&item.searchable_text(), InputType::Document).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        let cutoff = now - self.settings.notification_lookback;
        let hits = self.recent_neighbours(item, &vector, now, false)?;
        for hit in hits
            .iter()
            .filter(|h| h.similarity >= self.settings.embedding_skip_threshold)
        {
            let notified_recently = self
                .content_repo
                .get_by_id(hit.content_item_id)?
                .and_then(|n| n.notified_at)
                .is_some_and(|at| at >= cutoff);
            if notified_recently {
                return Ok(Some(hit.content_item_id));
            }
        }
        Ok(None)
    }

    /// Top-`top_k` neighbours with similarity at least `threshold`.
    /// Fetches `2 * top_k` candidates before filtering.
    pub fn similar_to_vector(
        &self,
        vector: &[f32],
        ticker: Option<&str>,
        exclude_id: Option<i64>,
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<VectorHit>, DomainError> {
        let mut hits = self.vector_store.search(
            vector,
            &VectorQuery {
                ticker,
                published_since: None,
                exclude_id,
                before_id: None,
                limit: top_k * 2,
            },
        )?;
        hits.retain(|h| h.similarity >= threshold);
        hits.truncate(top_k);
        Ok(hits)
    }

    pub async fn similar(
        &self,
        text: &str,
        ticker: Option<&str>,
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<VectorHit>, DomainError> {
        match self.embed_text(text, InputType::Query).await? {
            Some(vector) => self.similar_to_vector(&vector, ticker, None, top_k, threshold),
            None => Ok(Vec::new()),
        }
    }

    /// Neighbours of `item` (same ticker, item itself excluded) with their realised price changes.
    pub fn similar_with_outcomes(
        &self,
        item: &ContentItem,
        vector: &[f32],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<SimilarItem>, DomainError> {
        let hits = self.similar_to_vector(vector, item.ticker.as_deref(), Some(item.id), top_k, threshold)?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(neighbour) = self.content_repo.get_by_id(hit.content_item_id)? else {
                continue;
            };
            let price_changes = self
                .market_repo
                .price_match(hit.content_item_id)?
                .map(|m| m.changes)
                .filter(|c| !c.is_empty());
            out.push(SimilarItem {
                item: neighbour,
                similarity: hit.similarity,
                price_changes,
            });
        }
        Ok(out)
    }

    /// Embeds ticker-bearing items ingested since `since` that have no vector yet.
    pub async fn reconcile(&self, since: DateTime<Utc>) -> Result<ReconcileReport, DomainError> {
        let missing = self.content_repo.items_missing_embeddings(since)?;
        let mut report = ReconcileReport {
            candidates: missing.len(),
            ..Default::default()
        };
        if missing.is_empty() || self.embedder.dimension() == 0 {
            return Ok(report);
        }

        for chunk in missing.chunks(RECONCILE_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|i| i.searchable_text()).collect();
            let vectors = match self.embedder.embed(&texts, InputType::Document).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(batch = chunk.len(), error = %e, "Embedding batch failed");
                    report.failed += chunk.len();
                    continue;
                }
            };
            for (item, vector) in chunk.iter().zip(vectors.iter()) {
                if vector.is_empty() {
                    report.failed += 1;
                    continue;
                }
                match self.store(item, vector) {
                    Ok(()) => report.embedded += 1,
                    Err(e) => {
                        tracing::warn!(item_id = item.id, error = %e, "Vector upsert failed");
                        report.failed += 1;
                    }
                }
            }
            report.failed += chunk.len().saturating_sub(vectors.len());
        }

        tracing::info!(
            candidates = report.candidates,
            embedded = report.embedded,
            failed = report.failed,
            "Embedding reconciliation finished"
        );
        Ok(report)
    }

    pub fn vector_count(&self) -> Result<usize, DomainError> {
        self.vector_store.count()
    }

    /// Warns when stored vectors were produced with a different dimension.
    pub fn check_dimension(&self) {
        let provider_dim = self.embedder.dimension();
        if provider_dim == 0 {
            tracing::info!(provider = self.embedder.name(), "Semantic indexing disabled");
            return;
        }
        tracing::info!(provider = self.embedder.name(), dimension = provider_dim, "Embedding provider ready");
        if let Ok(Some(stored_dim)) = self.vector_store.stored_dimension() {
            if stored_dim != provider_dim {
                tracing::warn!(
                    stored_dim,
                    provider_dim,
                    "Stored vectors have a different dimension than the embedding provider"
                );
            }
        }
    }
}
