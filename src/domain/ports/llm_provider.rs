use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-completion backend addressed by its provider tag.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_tag(&self) -> &str;

    /// Returns the raw assistant text. Transport failures map to `Network`,
    /// non-success statuses to `Provider`.
    async fn complete(&self, model_identifier: &str, request: &CompletionRequest) -> Result<String, DomainError>;
}
