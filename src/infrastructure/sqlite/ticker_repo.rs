use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::entities::ticker::Ticker;
use crate::domain::error::DomainError;
use crate::domain::ports::ticker_repository::TickerRepository;
use crate::domain::values::priority::Priority;
use rusqlite::{params, OptionalExtension};

const SELECT_COLS: &str = "code, name, priority, active, created_at, updated_at";

pub struct SqliteTickerRepo {
    conn: SharedConnection,
}

impl SqliteTickerRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_ticker(row: &rusqlite::Row) -> Result<Ticker, rusqlite::Error> {
        let priority: u8 = row.get(2)?;
        let active: i32 = row.get(3)?;
        let created_str: String = row.get(4)?;
        let updated_str: String = row.get(5)?;
        Ok(Ticker {
            code: row.get(0)?,
            name: row.get(1)?,
            priority: Priority::new(priority).unwrap_or_default(),
            active: active != 0,
            created_at: parse_ts(&created_str),
            updated_at: parse_ts(&updated_str),
        })
    }

    fn list(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<Ticker>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_ticker)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl TickerRepository for SqliteTickerRepo {
    fn upsert(&self, ticker: &Ticker) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO tickers (code, name, priority, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                priority = excluded.priority,
                active = excluded.active,
                updated_at = excluded.updated_at",
            params![
                ticker.code,
                ticker.name,
                ticker.priority.value(),
                ticker.active as i32,
                fmt_ts(&ticker.created_at),
                fmt_ts(&ticker.updated_at),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to upsert ticker: {e}")))?;
        Ok(())
    }

    fn get(&self, code: &str) -> Result<Option<Ticker>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM tickers WHERE code = ?1"),
            params![code],
            Self::row_to_ticker,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn list_active(&self) -> Result<Vec<Ticker>, DomainError> {
        self.list(
            &format!("SELECT {SELECT_COLS} FROM tickers WHERE active = 1 ORDER BY priority ASC, code ASC"),
            &[],
        )
    }

    fn list_by_max_priority(&self, max_priority: u8) -> Result<Vec<Ticker>, DomainError> {
        self.list(
            &format!(
                "SELECT {SELECT_COLS} FROM tickers WHERE active = 1 AND priority <= ?1 ORDER BY priority ASC, code ASC"
            ),
            &[&max_priority],
        )
    }
}
