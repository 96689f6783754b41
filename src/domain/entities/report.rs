use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-ticker narrative plus structured price levels. Rows are append-only;
/// the most recent row per ticker is the current report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub id: i64,
    pub ticker_code: String,
    pub overall_summary: String,
    pub short_term_scenario: Option<String>,
    pub medium_term_scenario: Option<String>,
    pub long_term_scenario: Option<String>,
    pub risk_factors: Vec<String>,
    pub opportunity_factors: Vec<String>,
    pub recommendation: Option<String>,
    pub short_term_target_price: Option<f64>,
    pub short_term_support_price: Option<f64>,
    pub medium_term_target_price: Option<f64>,
    pub medium_term_support_price: Option<f64>,
    pub long_term_target_price: Option<f64>,
    pub base_price: Option<f64>,
    pub up_count: i64,
    pub down_count: i64,
    pub hold_count: i64,
    pub avg_confidence: Option<f64>,
    pub total_predictions: i64,
    pub custom_data: Option<serde_json::Value>,
    pub last_updated: DateTime<Utc>,
}

/// Short-term levels as written by one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortTermLevels {
    pub base_price: f64,
    pub target: f64,
    pub support: f64,
}

impl AnalysisSummary {
    pub fn short_term_levels(&self) -> Option<ShortTermLevels> {
        Some(ShortTermLevels {
            base_price: self.base_price?,
            target: self.short_term_target_price?,
            support: self.short_term_support_price?,
        })
    }

    pub fn is_ab_test(&self) -> bool {
        self.custom_data
            .as_ref()
            .and_then(|c| c.get("ab_test_enabled"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Levels stored under `custom_data.<arm>.price_targets`.
    pub fn arm_levels(&self, arm: &str) -> Option<ShortTermLevels> {
        let targets = self.custom_data.as_ref()?.get(arm)?.get("price_targets")?;
        Some(ShortTermLevels {
            base_price: targets.get("base_price")?.as_f64()?,
            target: targets.get("short_term_target")?.as_f64()?,
            support: targets.get("short_term_support")?.as_f64()?,
        })
    }

    /// Model id recorded for an A/B arm.
    pub fn arm_model_id(&self, arm: &str) -> Option<i64> {
        self.custom_data.as_ref()?.get(arm)?.get("model_id")?.as_i64()
    }
}
