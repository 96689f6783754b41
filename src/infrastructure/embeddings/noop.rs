use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};

/// Disables semantic indexing: every text maps to an empty vector, which the
/// indexer treats as "nothing to store".
pub struct NoopProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for NoopProvider {
    fn name(&self) -> &str {
        "noop"
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(vec![Vec::new(); texts.len()])
    }

    fn dimension(&self) -> usize {
        0
    }
}
