use crate::domain::error::DomainError;
use crate::domain::ports::llm_provider::{CompletionRequest, LlmProvider};
use crate::infrastructure::retry::{with_retry, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client for OpenAI and OpenAI-compatible gateways (OpenRouter).
pub struct OpenAiCompatProvider {
    client: Client,
    tag: String,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(tag: &str, base_url: &str, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            tag: tag.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            // One retry after two seconds.
            retry: RetryPolicy::new(1, Duration::from_secs(2)),
        }
    }

    pub fn openai(api_key: String) -> Self {
        Self::new("openai", super::OPENAI_BASE_URL, api_key)
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::new("openrouter", super::OPENROUTER_BASE_URL, api_key)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call(&self, model: &str, request: &CompletionRequest) -> Result<String, DomainError> {
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Network(format!("{} request failed: {e}", self.tag)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DomainError::Provider(format!("{} returned {status}: {text}", self.tag)));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::ModelParse(format!("{} response: {e}", self.tag)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::ModelParse(format!("{} returned no content", self.tag)))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_tag(&self) -> &str {
        &self.tag
    }

    async fn complete(&self, model_identifier: &str, request: &CompletionRequest) -> Result<String, DomainError> {
        with_retry(
            self.retry,
            &self.tag,
            |e: &DomainError| matches!(e, DomainError::Network(_) | DomainError::Provider(_)),
            || self.call(model_identifier, request),
        )
        .await
        .map_err(|e| match e {
            DomainError::Network(msg) | DomainError::Provider(msg) => DomainError::ModelUnavailable(msg),
            other => other,
        })
    }
}
