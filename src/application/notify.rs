use crate::application::embed::EmbedUseCase;
use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::ContentRepository;
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::prediction_repository::PredictionRepository;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Items created within this window are considered for notification.
pub const NOTIFY_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Default, Clone, Serialize)]
pub struct NotifyRun {
    pub candidates: usize,
    pub sent: usize,
    /// Near-duplicates of an item notified recently.
    pub suppressed: usize,
    /// Waiting for their first prediction; retried on a later run.
    pub held: usize,
    pub failed: usize,
}

pub struct NotifyUseCase {
    content_repo: Arc<dyn ContentRepository>,
    predictions: Arc<dyn PredictionRepository>,
    embed: Arc<EmbedUseCase>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifyUseCase {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        predictions: Arc<dyn PredictionRepository>,
        embed: Arc<EmbedUseCase>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            content_repo,
            predictions,
            embed,
            notifiers,
        }
    }

    /// Sends one item to every notifier and marks it notified when any succeeded.
    pub async fn notify_item(
        &self,
        item: &ContentItem,
        predictions: &[Prediction],
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut delivered = false;
        for notifier in &self.notifiers {
            match notifier.notify(item, predictions).await {
                Ok(()) => delivered = true,
                Err(e) => warn!(item_id = item.id, notifier = notifier.name(), error = %e, "Notification failed"),
            }
        }
        if !delivered {
            return Ok(false);
        }
        self.content_repo.mark_notified(item.id, now)
    }

    /// Notifies recent ticker-bearing items that were never notified, skipping
    /// near-duplicates of something already sent. Items without a prediction yet
    /// are held for a later run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<NotifyRun, DomainError> {
        let items = self
            .content_repo
            .unnotified_since(now - Duration::minutes(NOTIFY_WINDOW_MINUTES))?;
        let mut run = NotifyRun {
            candidates: items.len(),
            ..Default::default()
        };

        for item in &items {
            match self.embed.notified_neighbour(item).await {
                Ok(Some(neighbour_id)) => {
                    info!(item_id = item.id, neighbour_id, "Near-duplicate already notified, skipping");
                    run.suppressed += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => warn!(item_id = item.id, error = %e, "Neighbour check failed, notifying anyway"),
            }
            let predictions = match self.predictions.list_for_item(item.id) {
                Ok(p) => p,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Prediction lookup failed");
                    run.failed += 1;
                    continue;
                }
            };
            if predictions.is_empty() {
                debug!(item_id = item.id, "No prediction yet, holding notification");
                run.held += 1;
                continue;
            }
            match self.notify_item(item, &predictions, now).await {
                Ok(true) => run.sent += 1,
                Ok(false) => run.failed += 1,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Notification bookkeeping failed");
                    run.failed += 1;
                }
            }
        }
        Ok(run)
    }
}
