use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::entities::report::AnalysisSummary;
use crate::domain::error::DomainError;
use crate::domain::ports::report_repository::ReportRepository;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const SELECT_COLS: &str = "id, ticker_code, overall_summary, short_term_scenario, medium_term_scenario, long_term_scenario, risk_factors, opportunity_factors, recommendation, short_term_target_price, short_term_support_price, medium_term_target_price, medium_term_support_price, long_term_target_price, base_price, up_count, down_count, hold_count, avg_confidence, total_predictions, custom_data, last_updated";

pub struct SqliteReportRepo {
    conn: SharedConnection,
}

impl SqliteReportRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_report(row: &rusqlite::Row) -> Result<AnalysisSummary, rusqlite::Error> {
        let risks: String = row.get(6)?;
        let opportunities: String = row.get(7)?;
        let custom: Option<String> = row.get(20)?;
        let updated: String = row.get(21)?;
        Ok(AnalysisSummary {
            id: row.get(0)?,
            ticker_code: row.get(1)?,
            overall_summary: row.get(2)?,
            short_term_scenario: row.get(3)?,
            medium_term_scenario: row.get(4)?,
            long_term_scenario: row.get(5)?,
            risk_factors: serde_json::from_str(&risks).unwrap_or_default(),
            opportunity_factors: serde_json::from_str(&opportunities).unwrap_or_default(),
            recommendation: row.get(8)?,
            short_term_target_price: row.get(9)?,
            short_term_support_price: row.get(10)?,
            medium_term_target_price: row.get(11)?,
            medium_term_support_price: row.get(12)?,
            long_term_target_price: row.get(13)?,
            base_price: row.get(14)?,
            up_count: row.get(15)?,
            down_count: row.get(16)?,
            hold_count: row.get(17)?,
            avg_confidence: row.get(18)?,
            total_predictions: row.get(19)?,
            custom_data: custom.and_then(|s| serde_json::from_str(&s).ok()),
            last_updated: parse_ts(&updated),
        })
    }

    fn list(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<AnalysisSummary>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_report)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl ReportRepository for SqliteReportRepo {
    fn insert(&self, r: &AnalysisSummary) -> Result<i64, DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO analysis_summaries (ticker_code, overall_summary, short_term_scenario, medium_term_scenario, long_term_scenario, risk_factors, opportunity_factors, recommendation, short_term_target_price, short_term_support_price, medium_term_target_price, medium_term_support_price, long_term_target_price, base_price, up_count, down_count, hold_count, avg_confidence, total_predictions, custom_data, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                r.ticker_code,
                r.overall_summary,
                r.short_term_scenario,
                r.medium_term_scenario,
                r.long_term_scenario,
                serde_json::to_string(&r.risk_factors).unwrap_or_default(),
                serde_json::to_string(&r.opportunity_factors).unwrap_or_default(),
                r.recommendation,
                r.short_term_target_price,
                r.short_term_support_price,
                r.medium_term_target_price,
                r.medium_term_support_price,
                r.long_term_target_price,
                r.base_price,
                r.up_count,
                r.down_count,
                r.hold_count,
                r.avg_confidence,
                r.total_predictions,
                r.custom_data.as_ref().map(|c| c.to_string()),
                fmt_ts(&r.last_updated),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to insert report: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<AnalysisSummary>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM analysis_summaries WHERE id = ?1"),
            params![id],
            Self::row_to_report,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn latest_for_ticker(&self, ticker: &str) -> Result<Option<AnalysisSummary>, DomainError> {
        Ok(self.history(ticker, 1)?.into_iter().next())
    }

    fn history(&self, ticker: &str, limit: usize) -> Result<Vec<AnalysisSummary>, DomainError> {
        self.list(
            &format!(
                "SELECT {SELECT_COLS} FROM analysis_summaries WHERE ticker_code = ?1 ORDER BY last_updated DESC, id DESC LIMIT ?2"
            ),
            &[&ticker, &(limit as i64)],
        )
    }

    fn evaluable_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<AnalysisSummary>, DomainError> {
        self.list(
            &format!(
                "SELECT {SELECT_COLS} FROM analysis_summaries
                 WHERE last_updated <= ?1
                   AND base_price IS NOT NULL
                   AND short_term_target_price IS NOT NULL
                   AND short_term_support_price IS NOT NULL
                 ORDER BY last_updated ASC"
            ),
            &[&fmt_ts(&cutoff)],
        )
    }
}
