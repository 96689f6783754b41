use crate::domain::entities::evaluation::{DailyModelPerformance, ModelEvaluation};
use crate::domain::error::DomainError;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy)]
pub struct HumanRatings {
    pub quality: u8,
    pub usefulness: u8,
    pub overall: u8,
}

impl HumanRatings {
    pub fn new(quality: u8, usefulness: u8, overall: u8) -> Result<Self, String> {
        for (name, v) in [("quality", quality), ("usefulness", usefulness), ("overall", overall)] {
            if !(1..=5).contains(&v) {
                return Err(format!("{name} rating must be between 1 and 5, got {v}"));
            }
        }
        Ok(Self { quality, usefulness, overall })
    }
}

pub trait EvaluationRepository: Send + Sync {
    /// One evaluation per (report, model); a second insert is `Duplicate`.
    fn insert(&self, evaluation: &ModelEvaluation) -> Result<i64, DomainError>;
    fn exists(&self, report_id: i64, model_id: i64) -> Result<bool, DomainError>;
    fn get(&self, id: i64) -> Result<Option<ModelEvaluation>, DomainError>;
    fn list_for_report(&self, report_id: i64) -> Result<Vec<ModelEvaluation>, DomainError>;
    fn set_human_rating(
        &self,
        id: i64,
        ratings: HumanRatings,
        final_score: f64,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
    /// Evaluations whose report was written on `date` (KST).
    fn list_predicted_on(&self, date: NaiveDate) -> Result<Vec<ModelEvaluation>, DomainError>;
    fn upsert_daily_performance(&self, perf: &DailyModelPerformance) -> Result<(), DomainError>;
    fn daily_performance(&self, date: NaiveDate) -> Result<Vec<DailyModelPerformance>, DomainError>;
}
