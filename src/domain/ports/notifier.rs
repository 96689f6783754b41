use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, item: &ContentItem, predictions: &[Prediction]) -> Result<(), DomainError>;
}
