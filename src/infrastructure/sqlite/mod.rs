pub mod content_repo;
pub mod evaluation_repo;
pub mod market_data_repo;
pub mod migrations;
pub mod model_repo;
pub mod prediction_repo;
pub mod report_repo;
pub mod ticker_repo;
pub mod vector_store;

use crate::domain::error::DomainError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// One connection shared by every repository, so in-memory databases stay whole.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub fn open_connection(db_path: &str) -> Result<SharedConnection, DomainError> {
    let conn = Connection::open(db_path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    if db_path != ":memory:" {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| DomainError::Database(format!("Pragma error: {e}")))?;
    migrations::run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>, DomainError> {
    conn.lock().map_err(|e| DomainError::Database(e.to_string()))
}

/// Fixed-width RFC 3339 so stored timestamps order lexically.
pub(crate) fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc)))
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}
