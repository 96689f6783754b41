use crate::application::dedup::{DedupSettings, TextDeduplicator};
use crate::application::embed::EmbedUseCase;
use crate::application::predict::PredictUseCase;
use crate::application::ticker_mapper::TickerMapper;
use crate::domain::entities::content_item::ContentItem;
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::{ContentRepository, RecentTitle};
use crate::domain::values::content_type::ContentType;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Cleans a possibly-garbled string; `None` means the text cannot be salvaged.
pub type TextRepair = fn(&str) -> Option<String>;

fn trim_only(text: &str) -> Option<String> {
    Some(text.trim().to_string())
}

#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(ContentItem),
    Duplicate,
    /// Title could not be repaired.
    Unsalvageable,
    Failed(String),
}

impl SaveOutcome {
    pub fn into_item(self) -> Option<ContentItem> {
        match self {
            SaveOutcome::Saved(item) => Some(item),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestCounts {
    pub added: usize,
    pub deduped: usize,
    pub dropped: usize,
    pub failed: usize,
}

pub struct IngestUseCase {
    content_repo: Arc<dyn ContentRepository>,
    mapper: RwLock<TickerMapper>,
    dedup: TextDeduplicator,
    lookback: chrono::Duration,
    repair: TextRepair,
    embed: Arc<EmbedUseCase>,
    predict: Option<Arc<PredictUseCase>>,
}

impl IngestUseCase {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        mapper: TickerMapper,
        settings: &DedupSettings,
        embed: Arc<EmbedUseCase>,
    ) -> Self {
        Self {
            content_repo,
            mapper: RwLock::new(mapper),
            dedup: TextDeduplicator::new(settings),
            lookback: settings.lookback,
            repair: trim_only,
            embed,
            predict: None,
        }
    }

    pub fn with_text_repair(mut self, repair: TextRepair) -> Self {
        self.repair = repair;
        self
    }

    /// Predict every saved ticker-bearing item right after it is embedded.
    pub fn with_auto_predict(mut self, predict: Arc<PredictUseCase>) -> Self {
        self.predict = Some(predict);
        self
    }

    /// Swaps in a mapper built from the current watchlist.
    pub fn replace_mapper(&self, mapper: TickerMapper) {
        match self.mapper.write() {
            Ok(mut guard) => *guard = mapper,
            Err(poisoned) => *poisoned.into_inner() = mapper,
        }
    }

    pub fn resolve_ticker(&self, item: &ContentItem) -> Option<String> {
        match self.mapper.read() {
            Ok(m) => m.resolve(item),
            Err(poisoned) => poisoned.into_inner().resolve(item),
        }
    }

    /// Repairs, deduplicates, maps and stores one item, then embeds and
    /// (optionally) predicts it. Post-insert failures are logged and never
    /// undo the insert.
    pub async fn save(&self, mut item: ContentItem) -> SaveOutcome {
        let Some(title) = (self.repair)(&item.title).filter(|t| !t.is_empty()) else {
            warn!(source = %item.source, title = %item.title, "Dropping item with unrecoverable title");
            return SaveOutcome::Unsalvageable;
        };
        item.title = title;
        item.body = (self.repair)(&item.body).unwrap_or_else(|| {
            debug!(title = %item.title, "Body unrecoverable, stored empty");
            String::new()
        });
        item.content_type = ContentType::from_source(&item.source);
        if item.ticker.is_none() {
            item.ticker = self.resolve_ticker(&item);
        }
        item.created_at = Utc::now();

        let since = item.created_at - self.lookback;
        let check = |candidate: &ContentItem, recent: &[RecentTitle]| self.dedup.is_duplicate(candidate, recent);
        match self.content_repo.insert_if_novel(&item, since, &check) {
            Ok(Some(id)) => item.id = id,
            Ok(None) => {
                info!(title = %item.title, source = %item.source, "Duplicate item skipped");
                return SaveOutcome::Duplicate;
            }
            Err(e) if e.is_duplicate() => {
                info!(title = %item.title, "Duplicate item skipped");
                return SaveOutcome::Duplicate;
            }
            Err(e) => {
                error!(title = %item.title, error = %e, "Failed to store item");
                return SaveOutcome::Failed(e.to_string());
            }
        }

        debug!(item_id = item.id, ticker = ?item.ticker, "Item stored");
        self.post_process(&item).await;
        SaveOutcome::Saved(item)
    }

    async fn post_process(&self, item: &ContentItem) {
        if item.ticker.is_none() {
            return;
        }
        let vector = match self.embed.index(item).await {
            Ok(v) => v,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "Embedding failed; reconciliation will retry");
                None
            }
        };
        if let Some(predict) = &self.predict {
            if let Err(e) = predict.execute(item, vector).await {
                warn!(item_id = item.id, error = %e, "Auto-prediction failed");
            }
        }
    }

    pub async fn save_all(&self, items: Vec<ContentItem>) -> IngestCounts {
        let mut counts = IngestCounts::default();
        for item in items {
            match self.save(item).await {
                SaveOutcome::Saved(_) => counts.added += 1,
                SaveOutcome::Duplicate => counts.deduped += 1,
                SaveOutcome::Unsalvageable => counts.dropped += 1,
                SaveOutcome::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    pub fn get(&self, id: i64) -> Result<Option<ContentItem>, DomainError> {
        self.content_repo.get_by_id(id)
    }
}
