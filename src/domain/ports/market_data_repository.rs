use crate::domain::entities::market_data::*;
use crate::domain::error::DomainError;
use chrono::NaiveDate;

/// Time-series store. Every `upsert_*` is idempotent on the table's unique key
/// and returns the number of rows written.
pub trait MarketDataRepository: Send + Sync {
    fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<usize, DomainError>;
    fn upsert_minute_bars(&self, bars: &[MinuteBar]) -> Result<usize, DomainError>;
    fn upsert_orderbook(&self, snapshot: &OrderbookSnapshot) -> Result<usize, DomainError>;
    fn upsert_current_price(&self, snapshot: &CurrentPriceSnapshot) -> Result<usize, DomainError>;
    fn upsert_investor_flows(&self, flows: &[InvestorFlow]) -> Result<usize, DomainError>;
    fn upsert_sector_index(&self, snapshot: &SectorIndexSnapshot) -> Result<usize, DomainError>;
    fn upsert_overtime_prices(&self, prices: &[OvertimePrice]) -> Result<usize, DomainError>;
    fn upsert_index_daily(&self, bars: &[IndexDailyBar]) -> Result<usize, DomainError>;
    fn upsert_stock_info(&self, info: &StockInfo) -> Result<usize, DomainError>;

    /// Bars strictly after `date`, ascending, at most `limit`.
    fn daily_bars_after(&self, code: &str, date: NaiveDate, limit: usize) -> Result<Vec<DailyBar>, DomainError>;
    fn daily_bar_on(&self, code: &str, date: NaiveDate) -> Result<Option<DailyBar>, DomainError>;
    /// Latest bars on or before `date`, newest first.
    fn latest_daily_bars(&self, code: &str, on_or_before: NaiveDate, limit: usize) -> Result<Vec<DailyBar>, DomainError>;
    fn daily_bars_between(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyBar>, DomainError>;
    fn latest_current_price_on(&self, code: &str, date: NaiveDate) -> Result<Option<CurrentPriceSnapshot>, DomainError>;
    fn overtime_on(&self, code: &str, date: NaiveDate) -> Result<Option<OvertimePrice>, DomainError>;
    fn index_daily_between(&self, index_code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<IndexDailyBar>, DomainError>;
    fn minute_bars_on(&self, code: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DomainError>;

    fn upsert_price_match(&self, m: &NewsPriceMatch) -> Result<(), DomainError>;
    fn price_match(&self, content_item_id: i64) -> Result<Option<NewsPriceMatch>, DomainError>;

    /// Row count of a market table, for diagnostics and idempotency checks.
    fn count_rows(&self, table: MarketTable) -> Result<usize, DomainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketTable {
    DailyBars,
    MinuteBars,
    Orderbook,
    CurrentPrice,
    InvestorFlow,
    SectorIndex,
    Overtime,
    IndexDaily,
    StockInfo,
    PriceMatch,
}

impl MarketTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            MarketTable::DailyBars => "ohlcv_daily",
            MarketTable::MinuteBars => "ohlcv_minute",
            MarketTable::Orderbook => "orderbook",
            MarketTable::CurrentPrice => "current_price",
            MarketTable::InvestorFlow => "investor_flow",
            MarketTable::SectorIndex => "sector_index",
            MarketTable::Overtime => "overtime_price",
            MarketTable::IndexDaily => "index_daily",
            MarketTable::StockInfo => "stock_info",
            MarketTable::PriceMatch => "news_price_match",
        }
    }
}
