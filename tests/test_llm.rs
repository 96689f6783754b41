use newspulse::domain::error::DomainError;
use newspulse::domain::ports::llm_provider::{CompletionRequest, LlmProvider};
use newspulse::infrastructure::llm::openai_compat::OpenAiCompatProvider;
use newspulse::infrastructure::retry::RetryPolicy;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> CompletionRequest {
    CompletionRequest {
        system: "주식 뉴스 분석가".into(),
        prompt: "삼성전자 HBM 공급 계약".into(),
        temperature: 0.3,
        max_tokens: 1000,
    }
}

fn provider(server: &MockServer) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new("openai", &server.uri(), "sk-test".into())
        .with_retry(RetryPolicy::new(1, Duration::from_millis(10)))
}

#[tokio::test]
async fn test_completion_returns_assistant_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"sentiment_direction\": \"positive\"}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = provider(&server).complete("gpt-4o-mini", &request()).await.unwrap();
    assert_eq!(text, "{\"sentiment_direction\": \"positive\"}");
}

#[tokio::test]
async fn test_server_errors_retry_once_then_report_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let err = provider(&server).complete("gpt-4o-mini", &request()).await.unwrap_err();
    assert!(matches!(err, DomainError::ModelUnavailable(_)));
}

#[tokio::test]
async fn test_empty_choices_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).complete("gpt-4o-mini", &request()).await.unwrap_err();
    assert!(matches!(err, DomainError::ModelParse(_)));
}
