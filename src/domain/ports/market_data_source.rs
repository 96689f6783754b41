use crate::domain::entities::market_data::*;
use crate::domain::error::DomainError;
use chrono::NaiveDate;

/// Live market data, as served by the brokerage API.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn daily_chart(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyBar>, DomainError>;
    async fn current_price(&self, code: &str) -> Result<CurrentPriceSnapshot, DomainError>;
    /// Today's minute bars up to now.
    async fn minute_chart(&self, code: &str) -> Result<Vec<MinuteBar>, DomainError>;
    /// Minute bars of a past trading day.
    async fn minute_chart_on(&self, code: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DomainError>;
    async fn orderbook(&self, code: &str) -> Result<OrderbookSnapshot, DomainError>;
    async fn investor_flows(&self, code: &str) -> Result<Vec<InvestorFlow>, DomainError>;
    async fn stock_info(&self, code: &str) -> Result<StockInfo, DomainError>;
    async fn sector_index(&self, sector_code: &str) -> Result<SectorIndexSnapshot, DomainError>;
    async fn index_daily(&self, index_code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<IndexDailyBar>, DomainError>;
    async fn overtime_price(&self, code: &str) -> Result<OvertimePrice, DomainError>;
    async fn overtime_daily(&self, code: &str) -> Result<Vec<OvertimePrice>, DomainError>;
}
