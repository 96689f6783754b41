use crate::domain::entities::ticker::Ticker;
use crate::domain::error::DomainError;

pub trait TickerRepository: Send + Sync {
    /// Inserts or updates name/priority/active for `ticker.code`.
    fn upsert(&self, ticker: &Ticker) -> Result<(), DomainError>;
    fn get(&self, code: &str) -> Result<Option<Ticker>, DomainError>;
    fn list_active(&self) -> Result<Vec<Ticker>, DomainError>;
    /// Active tickers with priority value `<= max_priority`, most important first.
    fn list_by_max_priority(&self, max_priority: u8) -> Result<Vec<Ticker>, DomainError>;
}
