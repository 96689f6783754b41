use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;
use crate::domain::ports::notifier::Notifier;
use reqwest::Client;
use std::time::Duration;

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_base: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, item: &ContentItem, predictions: &[Prediction]) -> Result<(), DomainError> {
        let resp = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.bot_token))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": super::render_message(item, predictions),
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .map_err(|e| DomainError::Network(format!("telegram: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Provider(format!("telegram returned {status}: {body}")));
        }
        Ok(())
    }
}
