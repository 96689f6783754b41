use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::DomainError;
use crate::domain::ports::prediction_repository::*;
use chrono::{DateTime, Utc};
use rusqlite::params;

const SELECT_COLS: &str = "id, content_item_id, model_id, ticker_code, sentiment_direction, sentiment_score, impact_level, relevance_score, urgency_level, impact_analysis, reasoning, base_price, target_horizon, created_at";

pub struct SqlitePredictionRepo {
    conn: SharedConnection,
}

impl SqlitePredictionRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_prediction(row: &rusqlite::Row) -> Result<Prediction, rusqlite::Error> {
        let direction: String = row.get(4)?;
        let impact: String = row.get(6)?;
        let urgency: String = row.get(8)?;
        let analysis: String = row.get(9)?;
        let created_str: String = row.get(13)?;
        Ok(Prediction {
            id: row.get(0)?,
            content_item_id: row.get(1)?,
            model_id: row.get(2)?,
            ticker_code: row.get(3)?,
            sentiment_direction: direction.parse().unwrap_or_default(),
            sentiment_score: row.get(5)?,
            impact_level: impact.parse().unwrap_or_default(),
            relevance_score: row.get(7)?,
            urgency_level: urgency.parse().unwrap_or_default(),
            impact_analysis: serde_json::from_str(&analysis).unwrap_or(serde_json::Value::Null),
            reasoning: row.get(10)?,
            base_price: row.get(11)?,
            target_horizon: row.get(12)?,
            created_at: parse_ts(&created_str),
        })
    }

    fn list(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<Prediction>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_prediction)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl PredictionRepository for SqlitePredictionRepo {
    fn insert(&self, p: &Prediction) -> Result<i64, DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO predictions (content_item_id, model_id, ticker_code, sentiment_direction, sentiment_score, impact_level, relevance_score, urgency_level, impact_analysis, reasoning, base_price, target_horizon, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                p.content_item_id,
                p.model_id,
                p.ticker_code,
                p.sentiment_direction.to_string(),
                p.sentiment_score,
                p.impact_level.to_string(),
                p.relevance_score,
                p.urgency_level.to_string(),
                p.impact_analysis.to_string(),
                p.reasoning,
                p.base_price,
                p.target_horizon,
                fmt_ts(&p.created_at),
            ],
        )
        .map_err(DomainError::from)?;
        Ok(conn.last_insert_rowid())
    }

    fn exists(&self, content_item_id: i64, model_id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM predictions WHERE content_item_id = ?1 AND model_id = ?2",
                params![content_item_id, model_id],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn list_for_item(&self, content_item_id: i64) -> Result<Vec<Prediction>, DomainError> {
        self.list(
            &format!("SELECT {SELECT_COLS} FROM predictions WHERE content_item_id = ?1 ORDER BY model_id"),
            &[&content_item_id],
        )
    }

    fn list_for_ticker(&self, ticker: &str, since: DateTime<Utc>) -> Result<Vec<Prediction>, DomainError> {
        self.list(
            &format!(
                "SELECT {SELECT_COLS} FROM predictions WHERE ticker_code = ?1 AND created_at >= ?2 ORDER BY created_at DESC"
            ),
            &[&ticker, &fmt_ts(&since)],
        )
    }

    fn count_for_model_between(&self, model_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM predictions WHERE model_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![model_id, fmt_ts(&from), fmt_ts(&to)],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    fn counts_by_model(&self) -> Result<Vec<ModelPredictionCount>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare("SELECT model_id, COUNT(*) FROM predictions GROUP BY model_id ORDER BY model_id")
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(ModelPredictionCount {
                    model_id: r.get(0)?,
                    count: r.get::<_, i64>(1)? as usize,
                })
            })
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}
