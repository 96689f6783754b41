//! Realised price reaction after each ticker-bearing item.

use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::market_data::{NewsPriceMatch, PriceChanges};
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::{ContentFilter, ContentRepository};
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::values::market_calendar::{add_business_days, kst_date};
use crate::domain::values::scoring::price_change_pct;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Calendar days scanned per run; long enough for the 20-business-day horizon to fill in.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 35;

#[derive(Debug, Default, Clone, Serialize)]
pub struct MatchRun {
    pub candidates: usize,
    pub matched: usize,
    pub already_complete: usize,
    pub unmatched: usize,
}

pub struct PriceMatchUseCase {
    content_repo: Arc<dyn ContentRepository>,
    market_repo: Arc<dyn MarketDataRepository>,
}

impl PriceMatchUseCase {
    pub fn new(content_repo: Arc<dyn ContentRepository>, market_repo: Arc<dyn MarketDataRepository>) -> Self {
        Self {
            content_repo,
            market_repo,
        }
    }

    /// Close-to-close changes from the publication day (KST) to each business-day horizon.
    /// `None` when the publication-day close or every horizon close is missing.
    pub fn changes_for(&self, item: &ContentItem) -> Result<Option<PriceChanges>, DomainError> {
        let Some(code) = item.ticker.as_deref() else {
            return Ok(None);
        };
        let t0 = kst_date(item.published_at);
        let Some(base) = self.market_repo.daily_bar_on(code, t0)? else {
            debug!(item_id = item.id, code, %t0, "No close on publication day");
            return Ok(None);
        };

        let mut changes = PriceChanges::default();
        for days in PriceChanges::HORIZONS {
            let tn = add_business_days(t0, days);
            let close = self.market_repo.daily_bar_on(code, tn)?.map(|b| b.close);
            changes.set(days, close.map(|c| price_change_pct(base.close, c)));
        }
        Ok((!changes.is_empty()).then_some(changes))
    }

    pub fn match_item(&self, item: &ContentItem, now: DateTime<Utc>) -> Result<Option<NewsPriceMatch>, DomainError> {
        let (Some(code), Some(changes)) = (item.ticker.clone(), self.changes_for(item)?) else {
            return Ok(None);
        };
        let m = NewsPriceMatch {
            content_item_id: item.id,
            ticker_code: code,
            changes,
            calculated_at: now,
        };
        self.market_repo.upsert_price_match(&m)?;
        Ok(Some(m))
    }

    /// Matches recent ticker-bearing items whose change vector is still incomplete.
    pub fn run(&self, now: DateTime<Utc>, lookback_days: i64) -> Result<MatchRun, DomainError> {
        let items: Vec<ContentItem> = self
            .content_repo
            .query(&ContentFilter {
                since: Some(now - Duration::days(lookback_days)),
                ..Default::default()
            })?
            .into_iter()
            .filter(|i| i.ticker.is_some())
            .collect();
        let mut run = MatchRun {
            candidates: items.len(),
            ..Default::default()
        };

        for item in &items {
            if let Some(existing) = self.market_repo.price_match(item.id)? {
                if existing.changes.is_complete() {
                    run.already_complete += 1;
                    continue;
                }
            }
            match self.match_item(item, now) {
                Ok(Some(_)) => run.matched += 1,
                Ok(None) => run.unmatched += 1,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Price matching failed");
                    run.unmatched += 1;
                }
            }
        }

        info!(
            candidates = run.candidates,
            matched = run.matched,
            unmatched = run.unmatched,
            "News-price matching finished"
        );
        Ok(run)
    }
}
