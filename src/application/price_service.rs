//! Price-at-time answers that degrade from live quotes to stored snapshots.

use crate::domain::error::DomainError;
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::ports::market_data_source::MarketDataSource;
use crate::domain::values::market_calendar::{kst_date, session_at, MarketStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    LiveQuote,
    IntradaySnapshot,
    LiveOvertime,
    StoredOvertime,
    DailyClose,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub ticker: String,
    pub price: f64,
    pub source: PriceSource,
    pub status: MarketStatus,
    pub as_of: DateTime<Utc>,
}

pub struct PriceService {
    market_repo: Arc<dyn MarketDataRepository>,
    live: Option<Arc<dyn MarketDataSource>>,
}

impl PriceService {
    pub fn new(market_repo: Arc<dyn MarketDataRepository>, live: Option<Arc<dyn MarketDataSource>>) -> Self {
        Self { market_repo, live }
    }

    /// Best available price for `ticker` at `now`, by session:
    /// market hours prefer the live quote, then today's intraday snapshot;
    /// pre and post market prefer today's overtime price (live first after the close);
    /// everything falls back to the latest daily close.
    pub async fn current_price(&self, ticker: &str, now: DateTime<Utc>) -> Result<Option<PriceQuote>, DomainError> {
        let status = session_at(now);
        let today = kst_date(now);
        let quote = |price: f64, source: PriceSource| PriceQuote {
            ticker: ticker.to_string(),
            price,
            source,
            status,
            as_of: now,
        };

        match status {
            MarketStatus::Market => {
                if let Some(live) = &self.live {
                    match live.current_price(ticker).await {
                        Ok(snapshot) if snapshot.price > 0.0 => {
                            if let Err(e) = self.market_repo.upsert_current_price(&snapshot) {
                                warn!(ticker, error = %e, "Failed to store live quote");
                            }
                            return Ok(Some(quote(snapshot.price, PriceSource::LiveQuote)));
                        }
                        Ok(_) => debug!(ticker, "Live quote had no price"),
                        Err(e) => warn!(ticker, error = %e, "Live quote failed, using stored data"),
                    }
                }
                if let Some(snapshot) = self.market_repo.latest_current_price_on(ticker, today)? {
                    return Ok(Some(quote(snapshot.price, PriceSource::IntradaySnapshot)));
                }
            }
            MarketStatus::PreMarket | MarketStatus::PostMarket => {
                if status == MarketStatus::PostMarket {
                    if let Some(live) = &self.live {
                        match live.overtime_price(ticker).await {
                            Ok(ot) if ot.price > 0.0 => {
                                if let Err(e) = self.market_repo.upsert_overtime_prices(std::slice::from_ref(&ot)) {
                                    warn!(ticker, error = %e, "Failed to store overtime quote");
                                }
                                return Ok(Some(quote(ot.price, PriceSource::LiveOvertime)));
                            }
                            Ok(_) => debug!(ticker, "Overtime quote had no price"),
                            Err(e) => warn!(ticker, error = %e, "Overtime quote failed, using stored data"),
                        }
                    }
                }
                if let Some(ot) = self.market_repo.overtime_on(ticker, today)? {
                    if ot.price > 0.0 {
                        return Ok(Some(quote(ot.price, PriceSource::StoredOvertime)));
                    }
                }
            }
            MarketStatus::Closed => {}
        }

        Ok(self
            .market_repo
            .latest_daily_bars(ticker, today, 1)?
            .into_iter()
            .next()
            .map(|bar| quote(bar.close, PriceSource::DailyClose)))
    }

    /// Price to anchor a prediction on; lookup failures are logged and yield `None`.
    pub async fn base_price(&self, ticker: &str, now: DateTime<Utc>) -> Option<f64> {
        match self.current_price(ticker, now).await {
            Ok(q) => q.map(|q| q.price),
            Err(e) => {
                warn!(ticker, error = %e, "Base price lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::market_data::{CurrentPriceSnapshot, DailyBar, OvertimePrice};
    use crate::infrastructure::sqlite::market_data_repo::SqliteMarketDataRepo;
    use crate::infrastructure::sqlite::open_connection;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn seeded() -> PriceService {
        let repo = SqliteMarketDataRepo::new(open_connection(":memory:").unwrap());
        let date = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        repo.upsert_daily_bars(&[DailyBar {
            code: "005930".into(),
            date,
            open: 70000.0,
            high: 71000.0,
            low: 69000.0,
            close: 70500.0,
            volume: 1000,
        }])
        .unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        repo.upsert_overtime_prices(&[OvertimePrice {
            code: "005930".into(),
            date: monday,
            price: 70800.0,
            change: None,
            change_sign: None,
            change_rate: None,
            volume: None,
            trading_value: None,
        }])
        .unwrap();
        repo.upsert_current_price(&CurrentPriceSnapshot {
            code: "005930".into(),
            datetime: monday.and_hms_opt(10, 30, 0).unwrap(),
            price: 71200.0,
            open: None,
            high: None,
            low: None,
            change: None,
            change_sign: None,
            change_rate: None,
            volume: None,
            trading_value: None,
        })
        .unwrap();
        PriceService::new(Arc::new(repo), None)
    }

    #[tokio::test]
    async fn test_closed_day_uses_daily_close() {
        let svc = seeded();
        // Saturday 2025-11-01 12:00 KST.
        let q = svc.current_price("005930", utc(2025, 11, 1, 3, 0)).await.unwrap().unwrap();
        assert_eq!(q.status, MarketStatus::Closed);
        assert_eq!(q.source, PriceSource::DailyClose);
        assert_eq!(q.price, 70500.0);
    }

    #[tokio::test]
    async fn test_market_hours_without_live_source_use_intraday_snapshot() {
        let svc = seeded();
        // Monday 2025-11-03 11:00 KST.
        let q = svc.current_price("005930", utc(2025, 11, 3, 2, 0)).await.unwrap().unwrap();
        assert_eq!(q.status, MarketStatus::Market);
        assert_eq!(q.source, PriceSource::IntradaySnapshot);
        assert_eq!(q.price, 71200.0);
    }

    #[tokio::test]
    async fn test_post_market_uses_stored_overtime() {
        let svc = seeded();
        // Monday 2025-11-03 16:00 KST.
        let q = svc.current_price("005930", utc(2025, 11, 3, 7, 0)).await.unwrap().unwrap();
        assert_eq!(q.status, MarketStatus::PostMarket);
        assert_eq!(q.source, PriceSource::StoredOvertime);
        assert_eq!(q.price, 70800.0);
    }

    #[tokio::test]
    async fn test_unknown_ticker_has_no_price() {
        let svc = seeded();
        assert!(svc.base_price("000660", utc(2025, 11, 3, 2, 0)).await.is_none());
    }
}
