//! Batched market-data collection over the watchlist and the index catalogue.

use crate::domain::error::DomainError;
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::ports::market_data_source::MarketDataSource;
use crate::domain::ports::ticker_repository::TickerRepository;
use crate::domain::values::index_catalog::{all_indices, SECTOR_INDICES};
use crate::domain::values::market_calendar::{is_market_open, kst_date};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Days of daily history refreshed by the end-of-day collectors.
const DAILY_REFRESH_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub batch_size: usize,
    /// Pause between batches.
    pub rate_limit: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            rate_limit: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectReport {
    pub kind: String,
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: usize,
    /// Set when the collector did not run (market closed, empty watchlist).
    pub skipped: Option<String>,
}

impl CollectReport {
    fn skipped(kind: &str, reason: &str) -> Self {
        Self {
            kind: kind.to_string(),
            skipped: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn summary(&self) -> String {
        match &self.skipped {
            Some(reason) => format!("{}: skipped ({reason})", self.kind),
            None => format!(
                "{}: {}/{} ok, {} failed, {} rows",
                self.kind, self.succeeded, self.targets, self.failed, self.rows
            ),
        }
    }
}

pub struct MarketCollector {
    tickers: Arc<dyn TickerRepository>,
    repo: Arc<dyn MarketDataRepository>,
    source: Arc<dyn MarketDataSource>,
    settings: CollectorSettings,
}

impl MarketCollector {
    pub fn new(
        tickers: Arc<dyn TickerRepository>,
        repo: Arc<dyn MarketDataRepository>,
        source: Arc<dyn MarketDataSource>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            tickers,
            repo,
            source,
            settings,
        }
    }

    fn watchlist(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.tickers.list_active()?.into_iter().map(|t| t.code).collect())
    }

    /// Runs `op` over `codes` in batches: each batch concurrently, with a pause in between.
    async fn run_batched<F, Fut>(&self, kind: &str, codes: Vec<String>, op: F) -> CollectReport
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<usize, DomainError>>,
    {
        let mut report = CollectReport {
            kind: kind.to_string(),
            targets: codes.len(),
            ..Default::default()
        };
        if codes.is_empty() {
            report.skipped = Some("no targets".into());
            return report;
        }

        let batch_size = self.settings.batch_size.max(1);
        for (i, chunk) in codes.chunks(batch_size).enumerate() {
            if i > 0 && !self.settings.rate_limit.is_zero() {
                tokio::time::sleep(self.settings.rate_limit).await;
            }
            let results = join_all(chunk.iter().cloned().map(&op)).await;
            for (code, result) in chunk.iter().zip(results) {
                match result {
                    Ok(rows) => {
                        report.succeeded += 1;
                        report.rows += rows;
                    }
                    Err(e) => {
                        warn!(collector = kind, code = %code, error = %e, "Collection failed");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            collector = kind,
            targets = report.targets,
            succeeded = report.succeeded,
            failed = report.failed,
            rows = report.rows,
            "Collection finished"
        );
        report
    }

    pub async fn collect_minute_bars(&self, now: DateTime<Utc>) -> Result<CollectReport, DomainError> {
        if !is_market_open(now) {
            return Ok(CollectReport::skipped("minute_bars", "market closed"));
        }
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("minute_bars", codes, |code| async move {
                let bars = self.source.minute_chart(&code).await?;
                self.repo.upsert_minute_bars(&bars)
            })
            .await)
    }

    pub async fn collect_current_prices(&self, now: DateTime<Utc>) -> Result<CollectReport, DomainError> {
        if !is_market_open(now) {
            return Ok(CollectReport::skipped("current_price", "market closed"));
        }
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("current_price", codes, |code| async move {
                let snapshot = self.source.current_price(&code).await?;
                self.repo.upsert_current_price(&snapshot)
            })
            .await)
    }

    pub async fn collect_orderbooks(&self, now: DateTime<Utc>) -> Result<CollectReport, DomainError> {
        if !is_market_open(now) {
            return Ok(CollectReport::skipped("orderbook", "market closed"));
        }
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("orderbook", codes, |code| async move {
                let snapshot = self.source.orderbook(&code).await?;
                self.repo.upsert_orderbook(&snapshot)
            })
            .await)
    }

    /// Refreshes the last week of daily bars so late corrections are picked up.
    pub async fn collect_daily_bars(&self, now: DateTime<Utc>) -> Result<CollectReport, DomainError> {
        let to = kst_date(now);
        self.backfill_daily(to - ChronoDuration::days(DAILY_REFRESH_DAYS), to).await
    }

    pub async fn backfill_daily(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        check_range(from, to)?;
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("daily_bars", codes, |code| async move {
                let bars = self.source.daily_chart(&code, from, to).await?;
                self.repo.upsert_daily_bars(&bars)
            })
            .await)
    }

    pub async fn collect_investor_flows(&self) -> Result<CollectReport, DomainError> {
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("investor_flow", codes, |code| async move {
                let flows = self.source.investor_flows(&code).await?;
                self.repo.upsert_investor_flows(&flows)
            })
            .await)
    }

    pub async fn collect_sector_indices(&self) -> Result<CollectReport, DomainError> {
        let codes = SECTOR_INDICES.iter().map(|i| i.code.to_string()).collect();
        Ok(self
            .run_batched("sector_index", codes, |code| async move {
                let snapshot = self.source.sector_index(&code).await?;
                self.repo.upsert_sector_index(&snapshot)
            })
            .await)
    }

    pub async fn collect_index_daily(&self, now: DateTime<Utc>) -> Result<CollectReport, DomainError> {
        let to = kst_date(now);
        self.backfill_index(to - ChronoDuration::days(DAILY_REFRESH_DAYS), to).await
    }

    pub async fn backfill_index(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        check_range(from, to)?;
        let codes = all_indices().map(|i| i.code.to_string()).collect();
        Ok(self
            .run_batched("index_daily", codes, |code| async move {
                let bars = self.source.index_daily(&code, from, to).await?;
                self.repo.upsert_index_daily(&bars)
            })
            .await)
    }

    pub async fn collect_overtime(&self) -> Result<CollectReport, DomainError> {
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("overtime", codes, |code| async move {
                let price = self.source.overtime_price(&code).await?;
                if price.price <= 0.0 {
                    return Ok(0);
                }
                self.repo.upsert_overtime_prices(std::slice::from_ref(&price))
            })
            .await)
    }

    /// The overtime history endpoint returns recent days only; rows outside the range are dropped.
    pub async fn backfill_overtime(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        check_range(from, to)?;
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("overtime_daily", codes, |code| async move {
                let mut prices = self.source.overtime_daily(&code).await?;
                prices.retain(|p| p.date >= from && p.date <= to && p.price > 0.0);
                self.repo.upsert_overtime_prices(&prices)
            })
            .await)
    }

    pub async fn collect_stock_info(&self) -> Result<CollectReport, DomainError> {
        let codes = self.watchlist()?;
        Ok(self
            .run_batched("stock_info", codes, |code| async move {
                let info = self.source.stock_info(&code).await?;
                self.repo.upsert_stock_info(&info)
            })
            .await)
    }
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<(), DomainError> {
    if from > to {
        return Err(DomainError::InvalidInput(format!("--from {from} is after --to {to}")));
    }
    Ok(())
}
