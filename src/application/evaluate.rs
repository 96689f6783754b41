use crate::application::model_registry::Arm;
use crate::domain::entities::evaluation::{DailyModelPerformance, ModelEvaluation};
use crate::domain::entities::report::{AnalysisSummary, ShortTermLevels};
use crate::domain::error::DomainError;
use crate::domain::ports::evaluation_repository::{EvaluationRepository, HumanRatings};
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::ports::model_repository::ModelRepository;
use crate::domain::ports::prediction_repository::PredictionRepository;
use crate::domain::ports::report_repository::ReportRepository;
use crate::domain::values::market_calendar::{kst, kst_date};
use crate::domain::values::scoring::{
    check_window, final_score, human_score, sub_scores, Bar, PriceLevels, SubScores, EVALUATION_WINDOW_DAYS,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Serialize)]
pub struct EvaluationRun {
    pub reports: usize,
    pub evaluated: usize,
    pub already_evaluated: usize,
    /// No daily bar after the report date yet.
    pub awaiting_prices: usize,
    /// Report or arm without a complete base/target/support triple or model id.
    pub incomplete: usize,
}

pub struct EvaluateUseCase {
    reports: Arc<dyn ReportRepository>,
    evaluations: Arc<dyn EvaluationRepository>,
    market_repo: Arc<dyn MarketDataRepository>,
    predictions: Arc<dyn PredictionRepository>,
    models: Arc<dyn ModelRepository>,
}

/// UTC bounds `[start, end)` of a KST calendar day.
pub fn kst_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = kst()
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    (start, start + Duration::days(1))
}

/// `(model id, levels)` per evaluable arm of a report.
fn report_arms(report: &AnalysisSummary) -> Vec<(Option<i64>, Option<ShortTermLevels>)> {
    if report.is_ab_test() {
        [Arm::A, Arm::B]
            .iter()
            .filter(|arm| report.custom_data.as_ref().and_then(|c| c.get(arm.key())).is_some())
            .map(|arm| (report.arm_model_id(arm.key()), report.arm_levels(arm.key())))
            .collect()
    } else {
        let model_id = report
            .custom_data
            .as_ref()
            .and_then(|c| c.get("model_id"))
            .and_then(|v| v.as_i64());
        vec![(model_id, report.short_term_levels())]
    }
}

fn stored_sub_scores(e: &ModelEvaluation) -> SubScores {
    SubScores {
        target_accuracy: e.target_accuracy_score,
        timing: e.timing_score,
        risk_management: e.risk_management_score,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl EvaluateUseCase {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        evaluations: Arc<dyn EvaluationRepository>,
        market_repo: Arc<dyn MarketDataRepository>,
        predictions: Arc<dyn PredictionRepository>,
        models: Arc<dyn ModelRepository>,
    ) -> Self {
        Self {
            reports,
            evaluations,
            market_repo,
            predictions,
            models,
        }
    }

    /// Scores every arm of reports at least one day old that has no evaluation yet.
    pub fn evaluate_pending(&self, now: DateTime<Utc>) -> Result<EvaluationRun, DomainError> {
        let reports = self.reports.evaluable_before(now - Duration::days(1))?;
        let mut run = EvaluationRun {
            reports: reports.len(),
            ..Default::default()
        };

        for report in &reports {
            for (model_id, levels) in report_arms(report) {
                let (Some(model_id), Some(levels)) = (model_id, levels) else {
                    run.incomplete += 1;
                    continue;
                };
                if self.evaluations.exists(report.id, model_id)? {
                    run.already_evaluated += 1;
                    continue;
                }
                match self.evaluate_arm(report, model_id, levels, now)? {
                    Some(_) => run.evaluated += 1,
                    None => run.awaiting_prices += 1,
                }
            }
        }

        info!(
            reports = run.reports,
            evaluated = run.evaluated,
            awaiting_prices = run.awaiting_prices,
            "Evaluation pass finished"
        );
        Ok(run)
    }

    /// Scores one report arm against the first trading days after the report date.
    /// Returns `None` while no bar is available yet.
    pub fn evaluate_arm(
        &self,
        report: &AnalysisSummary,
        model_id: i64,
        levels: ShortTermLevels,
        now: DateTime<Utc>,
    ) -> Result<Option<ModelEvaluation>, DomainError> {
        let report_date = kst_date(report.last_updated);
        let bars: Vec<Bar> = self
            .market_repo
            .daily_bars_after(&report.ticker_code, report_date, EVALUATION_WINDOW_DAYS)?
            .into_iter()
            .map(|b| Bar {
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
            })
            .collect();

        let price_levels = PriceLevels {
            base: levels.base_price,
            target: levels.target,
            support: levels.support,
        };
        let Some(outcome) = check_window(&price_levels, &bars) else {
            debug!(report_id = report.id, ticker = %report.ticker_code, "No bars after report date yet");
            return Ok(None);
        };
        let subs = sub_scores(&price_levels, &outcome);

        let mut evaluation = ModelEvaluation {
            id: 0,
            report_id: report.id,
            model_id,
            ticker_code: report.ticker_code.clone(),
            predicted_at: report.last_updated,
            base_price: levels.base_price,
            predicted_target: levels.target,
            predicted_support: levels.support,
            actual_high_1d: outcome.one_day.map(|w| w.high),
            actual_low_1d: outcome.one_day.map(|w| w.low),
            actual_close_1d: outcome.one_day.map(|w| w.close),
            actual_high_5d: outcome.five_day.map(|w| w.high),
            actual_low_5d: outcome.five_day.map(|w| w.low),
            actual_close_5d: outcome.five_day.map(|w| w.close),
            target_achieved: outcome.target_achieved,
            target_achieved_days: outcome.target_achieved_days,
            support_breached: outcome.support_breached,
            target_accuracy_score: subs.target_accuracy,
            timing_score: subs.timing,
            risk_management_score: subs.risk_management,
            human_rating_quality: None,
            human_rating_usefulness: None,
            human_rating_overall: None,
            human_evaluated_at: None,
            final_score: final_score(subs.automatic(), None),
            evaluated_at: now,
        };
        match self.evaluations.insert(&evaluation) {
            Ok(id) => evaluation.id = id,
            Err(e) if e.is_duplicate() => return Ok(None),
            Err(e) => return Err(e),
        }
        info!(
            report_id = report.id,
            model_id,
            ticker = %report.ticker_code,
            achieved = outcome.target_achieved,
            final_score = evaluation.final_score,
            "Report evaluated"
        );
        Ok(Some(evaluation))
    }

    /// Records human ratings and re-blends the final score.
    pub fn rate(&self, evaluation_id: i64, ratings: HumanRatings, now: DateTime<Utc>) -> Result<ModelEvaluation, DomainError> {
        let evaluation = self
            .evaluations
            .get(evaluation_id)?
            .ok_or_else(|| DomainError::NotFound(format!("evaluation {evaluation_id}")))?;
        let auto = stored_sub_scores(&evaluation).automatic();
        let human = human_score(ratings.quality, ratings.usefulness, ratings.overall);
        let blended = final_score(auto, Some(human));
        self.evaluations.set_human_rating(evaluation_id, ratings, blended, now)?;
        self.evaluations
            .get(evaluation_id)?
            .ok_or_else(|| DomainError::NotFound(format!("evaluation {evaluation_id}")))
    }

    /// Rolls the evaluations of reports written on `date` (KST) up per model.
    pub fn aggregate_daily(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Vec<DailyModelPerformance>, DomainError> {
        let evaluations = self.evaluations.list_predicted_on(date)?;
        let mut by_model: BTreeMap<i64, Vec<&ModelEvaluation>> = BTreeMap::new();
        for e in &evaluations {
            by_model.entry(e.model_id).or_default().push(e);
        }
        let mut model_ids: BTreeSet<i64> = by_model.keys().copied().collect();
        model_ids.extend(self.models.list_active()?.into_iter().map(|m| m.id));

        let (start, end) = kst_day_bounds(date);
        let mut rows = Vec::new();
        for model_id in model_ids {
            let evals = by_model.remove(&model_id).unwrap_or_default();
            let total_predictions = self.predictions.count_for_model_between(model_id, start, end)? as i64;
            if evals.is_empty() && total_predictions == 0 {
                continue;
            }
            let evaluated = evals.len();
            let rate = |hit: fn(&ModelEvaluation) -> bool| {
                if evaluated == 0 {
                    0.0
                } else {
                    evals.iter().filter(|e| hit(e)).count() as f64 / evaluated as f64
                }
            };
            let human: Vec<f64> = evals
                .iter()
                .filter_map(|e| e.human_ratings())
                .map(|(q, u, o)| human_score(q, u, o))
                .collect();

            let perf = DailyModelPerformance {
                model_id,
                date,
                total_predictions,
                evaluated_count: evaluated as i64,
                human_evaluated_count: human.len() as i64,
                avg_final_score: mean(evals.iter().map(|e| e.final_score)),
                avg_auto_score: mean(evals.iter().map(|e| stored_sub_scores(e).automatic())),
                avg_human_score: mean(human.iter().copied()),
                avg_target_accuracy: mean(evals.iter().map(|e| e.target_accuracy_score)),
                avg_timing_score: mean(evals.iter().map(|e| e.timing_score)),
                avg_risk_management: mean(evals.iter().map(|e| e.risk_management_score)),
                target_achieved_rate: rate(|e| e.target_achieved),
                support_breach_rate: rate(|e| e.support_breached),
                updated_at: now,
            };
            if let Err(e) = self.evaluations.upsert_daily_performance(&perf) {
                warn!(model_id, %date, error = %e, "Failed to store daily performance");
                continue;
            }
            rows.push(perf);
        }
        info!(%date, models = rows.len(), "Daily model performance aggregated");
        Ok(rows)
    }

    pub fn evaluations_for_report(&self, report_id: i64) -> Result<Vec<ModelEvaluation>, DomainError> {
        self.evaluations.list_for_report(report_id)
    }

    pub fn daily_performance(&self, date: NaiveDate) -> Result<Vec<DailyModelPerformance>, DomainError> {
        self.evaluations.daily_performance(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kst_day_bounds() {
        let (start, end) = kst_day_bounds(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert_eq!(start.to_rfc3339(), "2025-11-02T15:00:00+00:00");
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn test_report_arms_single_and_ab() {
        let mut report = AnalysisSummary {
            base_price: Some(100.0),
            short_term_target_price: Some(110.0),
            short_term_support_price: Some(95.0),
            custom_data: Some(json!({"ab_test_enabled": false, "model_id": 7})),
            ..Default::default()
        };
        let arms = report_arms(&report);
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].0, Some(7));
        assert_eq!(arms[0].1.map(|l| l.target), Some(110.0));

        report.custom_data = Some(json!({
            "ab_test_enabled": true,
            "model_a": {"model_id": 1, "price_targets": {"base_price": 100.0, "short_term_target": 108.0, "short_term_support": 96.0}},
        }));
        let arms = report_arms(&report);
        assert_eq!(arms.len(), 1, "missing arm is skipped");
        assert_eq!(arms[0].0, Some(1));
        assert_eq!(arms[0].1.map(|l| l.target), Some(108.0));
    }
}
