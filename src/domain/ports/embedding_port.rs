use crate::domain::error::DomainError;

/// Stored documents and search queries may be embedded differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

/// Turns texts into dense vectors for the vector store.
///
/// An empty vector for an input means "no embedding"; callers skip it.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider id, logged at startup.
    fn name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError>;

    /// Vector length; 0 when embedding is disabled.
    fn dimension(&self) -> usize;
}
