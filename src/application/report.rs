use crate::application::model_registry::{Arm, ModelRegistry, ModelTarget};
use crate::application::price_service::PriceService;
use crate::application::prompt::{build_report_prompt, REPORT_SYSTEM_PROMPT};
use crate::application::response_parser::{parse_report, ParsedReport};
use crate::domain::entities::prediction::Prediction;
use crate::domain::entities::report::AnalysisSummary;
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::ContentRepository;
use crate::domain::ports::llm_provider::CompletionRequest;
use crate::domain::ports::prediction_repository::PredictionRepository;
use crate::domain::ports::report_repository::ReportRepository;
use crate::domain::ports::ticker_repository::TickerRepository;
use crate::domain::values::sentiment::SentimentDirection;
use chrono::{Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub lookback: Duration,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2000,
            lookback: Duration::days(7),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReportBatch {
    pub generated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct ReportUseCase {
    tickers: Arc<dyn TickerRepository>,
    content_repo: Arc<dyn ContentRepository>,
    predictions: Arc<dyn PredictionRepository>,
    reports: Arc<dyn ReportRepository>,
    registry: Arc<ModelRegistry>,
    prices: Arc<PriceService>,
    settings: ReportSettings,
}

fn price_targets(parsed: &ParsedReport, base_price: Option<f64>) -> Value {
    json!({
        "base_price": base_price,
        "short_term_target": parsed.short_term_target,
        "short_term_support": parsed.short_term_support,
        "medium_term_target": parsed.medium_term_target,
        "medium_term_support": parsed.medium_term_support,
        "long_term_target": parsed.long_term_target,
    })
}

/// Keeps one prediction per content item, preferring the primary model's.
fn one_per_item(predictions: Vec<Prediction>, primary: Option<i64>) -> Vec<Prediction> {
    let mut chosen: Vec<Prediction> = Vec::with_capacity(predictions.len());
    let mut slot: HashMap<i64, usize> = HashMap::new();
    for p in predictions {
        match slot.get(&p.content_item_id) {
            Some(&i) => {
                if Some(p.model_id) == primary && Some(chosen[i].model_id) != primary {
                    chosen[i] = p;
                }
            }
            None => {
                slot.insert(p.content_item_id, chosen.len());
                chosen.push(p);
            }
        }
    }
    chosen
}

fn arm_payload(target: &ModelTarget, parsed: &ParsedReport, base_price: Option<f64>) -> Value {
    json!({
        "model_id": target.model.id,
        "model_name": target.model.name,
        "overall_summary": parsed.overall_summary,
        "short_term_scenario": parsed.short_term_scenario,
        "medium_term_scenario": parsed.medium_term_scenario,
        "long_term_scenario": parsed.long_term_scenario,
        "risk_factors": parsed.risk_factors,
        "opportunity_factors": parsed.opportunity_factors,
        "recommendation": parsed.recommendation,
        "price_targets": price_targets(parsed, base_price),
    })
}

impl ReportUseCase {
    pub fn new(
        tickers: Arc<dyn TickerRepository>,
        content_repo: Arc<dyn ContentRepository>,
        predictions: Arc<dyn PredictionRepository>,
        reports: Arc<dyn ReportRepository>,
        registry: Arc<ModelRegistry>,
        prices: Arc<PriceService>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            tickers,
            content_repo,
            predictions,
            reports,
            registry,
            prices,
            settings,
        }
    }

    fn titled(&self, predictions: Vec<Prediction>) -> Result<Vec<(Prediction, String)>, DomainError> {
        let mut titles: HashMap<i64, String> = HashMap::new();
        let mut out = Vec::with_capacity(predictions.len());
        for p in predictions {
            let title = match titles.get(&p.content_item_id) {
                Some(t) => t.clone(),
                None => {
                    let t = self
                        .content_repo
                        .get_by_id(p.content_item_id)?
                        .map(|i| i.title)
                        .unwrap_or_default();
                    titles.insert(p.content_item_id, t.clone());
                    t
                }
            };
            out.push((p, title));
        }
        Ok(out)
    }

    /// Writes a new report for `ticker` from its recent predictions and the current price.
    ///
    /// With an A/B pair active both models write a report; each side is kept under
    /// `custom_data.model_a` / `custom_data.model_b` and the top-level fields come
    /// from model A (model B when A failed).
    pub async fn generate(&self, ticker: &str) -> Result<AnalysisSummary, DomainError> {
        let t = self
            .tickers
            .get(ticker)?
            .ok_or_else(|| DomainError::NotFound(format!("ticker {ticker}")))?;
        let now = Utc::now();
        let targets = self.registry.targets()?;
        let primary = targets.first().map(|t| t.model.id);
        let predictions = one_per_item(
            self.predictions.list_for_ticker(ticker, now - self.settings.lookback)?,
            primary,
        );
        let base_price = self.prices.base_price(ticker, now).await;
        let prompt = build_report_prompt(&t.code, &t.name, base_price, &self.titled(predictions.clone())?);

        let request = CompletionRequest {
            system: REPORT_SYSTEM_PROMPT.to_string(),
            prompt,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let request = &request;
        let results = join_all(targets.iter().map(|target| async move {
            let raw = self.registry.complete(&target.model, request).await?;
            parse_report(&raw)
        }))
        .await;

        let mut written: Vec<(&ModelTarget, ParsedReport)> = Vec::new();
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(parsed) => written.push((target, parsed)),
                Err(e) => error!(ticker, model = %target.model.name, error = %e, "Report generation failed"),
            }
        }
        let Some((lead, lead_parsed)) = written
            .iter()
            .find(|(t, _)| t.arm != Some(Arm::B))
            .or_else(|| written.first())
        else {
            return Err(DomainError::ModelUnavailable(format!("no model produced a report for {ticker}")));
        };

        let report_base = base_price.or(lead_parsed.base_price);
        let custom_data = if targets.iter().any(|t| t.arm.is_some()) {
            let mut data = serde_json::Map::new();
            data.insert("ab_test_enabled".into(), Value::Bool(true));
            for (target, parsed) in &written {
                if let Some(arm) = target.arm {
                    data.insert(arm.key().into(), arm_payload(target, parsed, report_base.or(parsed.base_price)));
                }
            }
            Value::Object(data)
        } else {
            json!({
                "ab_test_enabled": false,
                "model_id": lead.model.id,
                "model_name": lead.model.name,
            })
        };

        let count = |d: SentimentDirection| predictions.iter().filter(|p| p.sentiment_direction == d).count() as i64;
        let avg_confidence = if predictions.is_empty() {
            None
        } else {
            Some(predictions.iter().map(|p| p.relevance_score).sum::<f64>() / predictions.len() as f64)
        };

        let mut summary = AnalysisSummary {
            id: 0,
            ticker_code: t.code.clone(),
            overall_summary: lead_parsed.overall_summary.clone(),
            short_term_scenario: lead_parsed.short_term_scenario.clone(),
            medium_term_scenario: lead_parsed.medium_term_scenario.clone(),
            long_term_scenario: lead_parsed.long_term_scenario.clone(),
            risk_factors: lead_parsed.risk_factors.clone(),
            opportunity_factors: lead_parsed.opportunity_factors.clone(),
            recommendation: lead_parsed.recommendation.clone(),
            short_term_target_price: lead_parsed.short_term_target,
            short_term_support_price: lead_parsed.short_term_support,
            medium_term_target_price: lead_parsed.medium_term_target,
            medium_term_support_price: lead_parsed.medium_term_support,
            long_term_target_price: lead_parsed.long_term_target,
            base_price: report_base,
            up_count: count(SentimentDirection::Positive),
            down_count: count(SentimentDirection::Negative),
            hold_count: count(SentimentDirection::Neutral),
            avg_confidence,
            total_predictions: predictions.len() as i64,
            custom_data: Some(custom_data),
            last_updated: now,
        };
        summary.id = self.reports.insert(&summary)?;
        info!(
            ticker,
            report_id = summary.id,
            predictions = summary.total_predictions,
            arms = written.len(),
            "Report written"
        );
        Ok(summary)
    }

    /// Reports for every active ticker with priority value `<= max_priority`.
    pub async fn generate_for_priority(&self, max_priority: u8) -> Result<ReportBatch, DomainError> {
        let mut batch = ReportBatch::default();
        for t in self.tickers.list_by_max_priority(max_priority)? {
            match self.generate(&t.code).await {
                Ok(_) => batch.generated.push(t.code),
                Err(e) => {
                    warn!(ticker = %t.code, error = %e, "Skipping report");
                    batch.failed.push((t.code, e.to_string()));
                }
            }
        }
        Ok(batch)
    }

    pub fn latest(&self, ticker: &str) -> Result<Option<AnalysisSummary>, DomainError> {
        self.reports.latest_for_ticker(ticker)
    }

    pub fn history(&self, ticker: &str, limit: usize) -> Result<Vec<AnalysisSummary>, DomainError> {
        self.reports.history(ticker, limit)
    }
}
