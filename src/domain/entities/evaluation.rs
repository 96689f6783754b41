use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome score of one report arm (model) against realised prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub id: i64,
    pub report_id: i64,
    pub model_id: i64,
    pub ticker_code: String,
    pub predicted_at: DateTime<Utc>,
    pub base_price: f64,
    pub predicted_target: f64,
    pub predicted_support: f64,
    pub actual_high_1d: Option<f64>,
    pub actual_low_1d: Option<f64>,
    pub actual_close_1d: Option<f64>,
    pub actual_high_5d: Option<f64>,
    pub actual_low_5d: Option<f64>,
    pub actual_close_5d: Option<f64>,
    pub target_achieved: bool,
    pub target_achieved_days: Option<u32>,
    pub support_breached: bool,
    pub target_accuracy_score: f64,
    pub timing_score: f64,
    pub risk_management_score: f64,
    pub human_rating_quality: Option<u8>,
    pub human_rating_usefulness: Option<u8>,
    pub human_rating_overall: Option<u8>,
    pub human_evaluated_at: Option<DateTime<Utc>>,
    pub final_score: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl ModelEvaluation {
    pub fn human_ratings(&self) -> Option<(u8, u8, u8)> {
        Some((
            self.human_rating_quality?,
            self.human_rating_usefulness?,
            self.human_rating_overall?,
        ))
    }
}

/// Per-model daily rollup of evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyModelPerformance {
    pub model_id: i64,
    pub date: NaiveDate,
    pub total_predictions: i64,
    pub evaluated_count: i64,
    pub human_evaluated_count: i64,
    pub avg_final_score: Option<f64>,
    pub avg_auto_score: Option<f64>,
    pub avg_human_score: Option<f64>,
    pub avg_target_accuracy: Option<f64>,
    pub avg_timing_score: Option<f64>,
    pub avg_risk_management: Option<f64>,
    pub target_achieved_rate: f64,
    pub support_breach_rate: f64,
    pub updated_at: DateTime<Utc>,
}
