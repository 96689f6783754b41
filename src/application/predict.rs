use crate::application::dedup::EmbeddingVerdict;
use crate::application::embed::{EmbedUseCase, SimilarItem};
use crate::application::model_registry::{ModelRegistry, ModelTarget};
use crate::application::price_service::PriceService;
use crate::application::prompt::{build_prediction_prompt, PREDICTION_SYSTEM_PROMPT};
use crate::application::response_parser::parse_prediction;
use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::{Prediction, DEFAULT_HORIZON};
use crate::domain::error::DomainError;
use crate::domain::ports::cache::KeyValueCache;
use crate::domain::ports::content_repository::ContentRepository;
use crate::domain::ports::embedding_port::InputType;
use crate::domain::ports::llm_provider::CompletionRequest;
use crate::domain::ports::prediction_repository::PredictionRepository;
use crate::domain::ports::ticker_repository::TickerRepository;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const CACHE_PREFIX: &str = "prediction:";

#[derive(Debug, Clone)]
pub struct PredictSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub cache_ttl: Duration,
    pub top_k: usize,
    pub similarity_threshold: f64,
}

impl Default for PredictSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
            cache_ttl: Duration::from_secs(60 * 60),
            top_k: 5,
            similarity_threshold: 0.7,
        }
    }
}

/// What happened to one item on a prediction pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PredictOutcome {
    pub content_item_id: i64,
    pub predictions: Vec<Prediction>,
    /// Models that already had a prediction for the item.
    pub existing: usize,
    /// `(model name, error)` per failed model.
    pub failures: Vec<(String, String)>,
    /// Set when the item was skipped as a near-duplicate of `skipped_for`.
    pub skipped_for: Option<i64>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PendingReport {
    pub candidates: usize,
    pub predicted: usize,
    pub failed: usize,
}

/// Cache key over the model, the whitespace-normalised text and the sorted neighbour ids.
pub fn cache_key(model_id: i64, text: &str, similar_ids: &[i64]) -> String {
    let normalised = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut ids = similar_ids.to_vec();
    ids.sort_unstable();
    let ids = ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",");

    let mut hasher = Sha256::new();
    hasher.update(model_id.to_string().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(normalised.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(ids.as_bytes());
    format!("{CACHE_PREFIX}{}", hex::encode(hasher.finalize()))
}

pub struct PredictUseCase {
    content_repo: Arc<dyn ContentRepository>,
    prediction_repo: Arc<dyn PredictionRepository>,
    ticker_repo: Arc<dyn TickerRepository>,
    registry: Arc<ModelRegistry>,
    embed: Arc<EmbedUseCase>,
    prices: Arc<PriceService>,
    cache: Arc<dyn KeyValueCache>,
    settings: PredictSettings,
}

struct PromptContext<'a> {
    item: &'a ContentItem,
    ticker: &'a str,
    prompt: String,
    similar_ids: Vec<i64>,
    base_price: Option<f64>,
}

impl PredictUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        prediction_repo: Arc<dyn PredictionRepository>,
        ticker_repo: Arc<dyn TickerRepository>,
        registry: Arc<ModelRegistry>,
        embed: Arc<EmbedUseCase>,
        prices: Arc<PriceService>,
        cache: Arc<dyn KeyValueCache>,
        settings: PredictSettings,
    ) -> Self {
        Self {
            content_repo,
            prediction_repo,
            ticker_repo,
            registry,
            embed,
            prices,
            cache,
            settings,
        }
    }

    /// Predicts `item` with every dispatch target that has no prediction for it yet.
    ///
    /// `vector` is the item's document embedding when the caller already has it.
    /// With an active A/B pair both models run concurrently, and one side's
    /// failure leaves the other's prediction in place.
    pub async fn execute(&self, item: &ContentItem, vector: Option<Vec<f32>>) -> Result<PredictOutcome, DomainError> {
        if !item.is_persisted() {
            return Err(DomainError::InvalidInput("item must be saved before prediction".into()));
        }
        let Some(ticker) = item.ticker.as_deref() else {
            return Err(DomainError::InvalidInput(format!("item {} has no ticker", item.id)));
        };
        let mut outcome = PredictOutcome {
            content_item_id: item.id,
            ..Default::default()
        };

        let mut pending: Vec<ModelTarget> = Vec::new();
        for target in self.registry.targets()? {
            if self.prediction_repo.exists(item.id, target.model.id)? {
                outcome.existing += 1;
            } else {
                pending.push(target);
            }
        }
        if pending.is_empty() {
            return Ok(outcome);
        }

        let vector = match vector {
            Some(v) => Some(v),
            None => match self.embed.embed_text(&item.searchable_text(), InputType::Document).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Embedding failed, predicting without neighbours");
                    None
                }
            },
        };

        let mut similar: Vec<SimilarItem> = Vec::new();
        if let Some(vector) = &vector {
            if let EmbeddingVerdict::Duplicate { neighbour_id, .. } = self.embed.embedding_verdict(item, vector)? {
                outcome.skipped_for = Some(neighbour_id);
                return Ok(outcome);
            }
            similar = self.embed.similar_with_outcomes(
                item,
                vector,
                self.settings.top_k,
                self.settings.similarity_threshold,
            )?;
        }

        let base_price = self.prices.base_price(ticker, Utc::now()).await;
        let ticker_name = self
            .ticker_repo
            .get(ticker)?
            .map(|t| t.name)
            .unwrap_or_else(|| ticker.to_string());
        let ctx = PromptContext {
            item,
            ticker,
            prompt: build_prediction_prompt(item, ticker, &ticker_name, base_price, &similar),
            similar_ids: similar.iter().map(|s| s.item.id).collect(),
            base_price,
        };

        let results = join_all(pending.iter().map(|t| self.predict_with(&ctx, t))).await;
        for (target, result) in pending.iter().zip(results) {
            match result {
                Ok(Some(p)) => outcome.predictions.push(p),
                Ok(None) => outcome.existing += 1,
                Err(e) => {
                    error!(
                        item_id = item.id,
                        model = %target.model.name,
                        arm = ?target.arm,
                        error = %e,
                        "Prediction failed"
                    );
                    outcome.failures.push((target.model.name.clone(), e.to_string()));
                }
            }
        }

        info!(
            item_id = item.id,
            ticker,
            predicted = outcome.predictions.len(),
            failed = outcome.failures.len(),
            neighbours = ctx.similar_ids.len(),
            "Prediction pass finished"
        );
        Ok(outcome)
    }

    /// Returns `None` when a concurrent writer inserted the same (item, model) first.
    async fn predict_with(&self, ctx: &PromptContext<'_>, target: &ModelTarget) -> Result<Option<Prediction>, DomainError> {
        let model = &target.model;
        let key = cache_key(model.id, &ctx.item.searchable_text(), &ctx.similar_ids);

        let cached = match self.cache.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Prediction cache read failed");
                None
            }
        };
        let raw = match cached {
            Some(raw) => {
                tracing::debug!(item_id = ctx.item.id, model = %model.name, "Prediction cache hit");
                raw
            }
            None => {
                let request = CompletionRequest {
                    system: PREDICTION_SYSTEM_PROMPT.to_string(),
                    prompt: ctx.prompt.clone(),
                    temperature: self.settings.temperature,
                    max_tokens: self.settings.max_tokens,
                };
                self.registry.complete(model, &request).await?
            }
        };

        let parsed = parse_prediction(&raw)?;
        if let Err(e) = self.cache.set(&key, &raw, Some(self.settings.cache_ttl)).await {
            warn!(error = %e, "Prediction cache write failed");
        }

        let mut prediction = Prediction {
            id: 0,
            content_item_id: ctx.item.id,
            model_id: model.id,
            ticker_code: ctx.ticker.to_string(),
            sentiment_direction: parsed.sentiment_direction,
            sentiment_score: parsed.sentiment_score,
            impact_level: parsed.impact_level,
            relevance_score: parsed.relevance_score,
            urgency_level: parsed.urgency_level,
            impact_analysis: parsed.impact_analysis,
            reasoning: parsed.reasoning,
            base_price: ctx.base_price,
            target_horizon: DEFAULT_HORIZON.to_string(),
            created_at: Utc::now(),
        };
        match self.prediction_repo.insert(&prediction) {
            Ok(id) => {
                prediction.id = id;
                Ok(Some(prediction))
            }
            Err(e) if e.is_duplicate() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn predict_by_id(&self, content_item_id: i64) -> Result<PredictOutcome, DomainError> {
        let item = self
            .content_repo
            .get_by_id(content_item_id)?
            .ok_or_else(|| DomainError::NotFound(format!("content item {content_item_id}")))?;
        self.execute(&item, None).await
    }

    /// Re-predicts ticker-bearing items ingested since `since` that miss a prediction
    /// from any current dispatch target.
    pub async fn predict_pending(&self, since: DateTime<Utc>) -> Result<PendingReport, DomainError> {
        let model_ids: Vec<i64> = self.registry.targets()?.iter().map(|t| t.model.id).collect();
        let items = self.content_repo.items_missing_predictions(since, &model_ids)?;
        let mut report = PendingReport {
            candidates: items.len(),
            ..Default::default()
        };
        for item in &items {
            match self.execute(item, None).await {
                Ok(o) if o.failures.is_empty() => report.predicted += o.predictions.len(),
                Ok(o) => {
                    report.predicted += o.predictions.len();
                    report.failed += o.failures.len();
                }
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Re-prediction failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_ignores_whitespace_and_neighbour_order() {
        let a = cache_key(1, "삼성전자  실적\n발표", &[3, 1, 2]);
        let b = cache_key(1, "삼성전자 실적 발표", &[1, 2, 3]);
        assert_eq!(a, b);
        assert!(a.starts_with(CACHE_PREFIX));
        assert_eq!(a.len(), CACHE_PREFIX.len() + 64);
    }

    #[test]
    fn test_cache_key_depends_on_model() {
        assert_ne!(cache_key(1, "x", &[]), cache_key(2, "x", &[]));
    }
}
