use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;
use crate::domain::ports::notifier::Notifier;

/// Writes alerts to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, item: &ContentItem, predictions: &[Prediction]) -> Result<(), DomainError> {
        tracing::info!(
            item_id = item.id,
            ticker = item.ticker.as_deref().unwrap_or("-"),
            predictions = predictions.len(),
            message = %super::render_message(item, predictions),
            "Notification"
        );
        Ok(())
    }
}
