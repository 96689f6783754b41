use crate::domain::entities::report::AnalysisSummary;
use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

pub trait ReportRepository: Send + Sync {
    fn insert(&self, report: &AnalysisSummary) -> Result<i64, DomainError>;
    fn get(&self, id: i64) -> Result<Option<AnalysisSummary>, DomainError>;
    fn latest_for_ticker(&self, ticker: &str) -> Result<Option<AnalysisSummary>, DomainError>;
    fn history(&self, ticker: &str, limit: usize) -> Result<Vec<AnalysisSummary>, DomainError>;
    /// Reports updated at or before `cutoff` that carry base, target and support prices.
    fn evaluable_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<AnalysisSummary>, DomainError>;
}
