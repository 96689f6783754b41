use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::{ContentRepository, ContentStats};
use crate::domain::ports::prediction_repository::{ModelPredictionCount, PredictionRepository};
use crate::domain::ports::vector_store::VectorStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub content: ContentStats,
    pub embeddings: usize,
    pub predictions_by_model: Vec<ModelPredictionCount>,
}

pub struct StatsUseCase {
    content_repo: Arc<dyn ContentRepository>,
    predictions: Arc<dyn PredictionRepository>,
    vector_store: Arc<dyn VectorStore>,
}

impl StatsUseCase {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        predictions: Arc<dyn PredictionRepository>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            content_repo,
            predictions,
            vector_store,
        }
    }

    pub fn stats(&self) -> Result<PipelineStats, DomainError> {
        Ok(PipelineStats {
            content: self.content_repo.stats()?,
            embeddings: self.vector_store.count()?,
            predictions_by_model: self.predictions.counts_by_model()?,
        })
    }
}
