use crate::domain::values::levels::{ImpactLevel, UrgencyLevel};
use crate::domain::values::sentiment::SentimentDirection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HORIZON: &str = "1d";

/// The model's structured judgement on one content item. Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub content_item_id: i64,
    pub model_id: i64,
    pub ticker_code: String,
    pub sentiment_direction: SentimentDirection,
    pub sentiment_score: f64,
    pub impact_level: ImpactLevel,
    pub relevance_score: f64,
    pub urgency_level: UrgencyLevel,
    pub impact_analysis: serde_json::Value,
    pub reasoning: String,
    /// Price snapshot taken when the prediction was made.
    pub base_price: Option<f64>,
    pub target_horizon: String,
    pub created_at: DateTime<Utc>,
}

/// Where a prediction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionState {
    Predicting,
    Predicted,
    Evaluated,
}

impl Prediction {
    /// A prediction is evaluated once a price match covering its horizon exists.
    pub fn state(&self, realised_available: bool) -> PredictionState {
        if self.id == 0 {
            PredictionState::Predicting
        } else if realised_available {
            PredictionState::Evaluated
        } else {
            PredictionState::Predicted
        }
    }
}
