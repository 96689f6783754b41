use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelPredictionCount {
    pub model_id: i64,
    pub count: usize,
}

pub trait PredictionRepository: Send + Sync {
    /// Inserts one prediction; a second row for the same (item, model) is `Duplicate`.
    fn insert(&self, prediction: &Prediction) -> Result<i64, DomainError>;
    fn exists(&self, content_item_id: i64, model_id: i64) -> Result<bool, DomainError>;
    fn list_for_item(&self, content_item_id: i64) -> Result<Vec<Prediction>, DomainError>;
    fn list_for_ticker(&self, ticker: &str, since: DateTime<Utc>) -> Result<Vec<Prediction>, DomainError>;
    fn count_for_model_between(&self, model_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<usize, DomainError>;
    fn counts_by_model(&self) -> Result<Vec<ModelPredictionCount>, DomainError>;
}
