use super::{fmt_date, fmt_ts, lock, parse_date, parse_ts, parse_ts_opt, SharedConnection};
use crate::domain::entities::evaluation::{DailyModelPerformance, ModelEvaluation};
use crate::domain::error::DomainError;
use crate::domain::ports::evaluation_repository::*;
use crate::domain::values::market_calendar::kst;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};

const SELECT_COLS: &str = "id, report_id, model_id, ticker_code, predicted_at, base_price, predicted_target, predicted_support, actual_high_1d, actual_low_1d, actual_close_1d, actual_high_5d, actual_low_5d, actual_close_5d, target_achieved, target_achieved_days, support_breached, target_accuracy_score, timing_score, risk_management_score, human_rating_quality, human_rating_usefulness, human_rating_overall, human_evaluated_at, final_score, evaluated_at";

pub struct SqliteEvaluationRepo {
    conn: SharedConnection,
}

impl SqliteEvaluationRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_evaluation(row: &rusqlite::Row) -> Result<ModelEvaluation, rusqlite::Error> {
        let predicted_at: String = row.get(4)?;
        let achieved: i32 = row.get(14)?;
        let breached: i32 = row.get(16)?;
        let evaluated_at: String = row.get(25)?;
        Ok(ModelEvaluation {
            id: row.get(0)?,
            report_id: row.get(1)?,
            model_id: row.get(2)?,
            ticker_code: row.get(3)?,
            predicted_at: parse_ts(&predicted_at),
            base_price: row.get(5)?,
            predicted_target: row.get(6)?,
            predicted_support: row.get(7)?,
            actual_high_1d: row.get(8)?,
            actual_low_1d: row.get(9)?,
            actual_close_1d: row.get(10)?,
            actual_high_5d: row.get(11)?,
            actual_low_5d: row.get(12)?,
            actual_close_5d: row.get(13)?,
            target_achieved: achieved != 0,
            target_achieved_days: row.get(15)?,
            support_breached: breached != 0,
            target_accuracy_score: row.get(17)?,
            timing_score: row.get(18)?,
            risk_management_score: row.get(19)?,
            human_rating_quality: row.get(20)?,
            human_rating_usefulness: row.get(21)?,
            human_rating_overall: row.get(22)?,
            human_evaluated_at: parse_ts_opt(row.get(23)?),
            final_score: row.get(24)?,
            evaluated_at: parse_ts(&evaluated_at),
        })
    }

    fn list(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<ModelEvaluation>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_evaluation)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

/// UTC bounds of a KST calendar day.
fn kst_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = kst()
        .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
    (start, start + chrono::Duration::days(1))
}

impl EvaluationRepository for SqliteEvaluationRepo {
    fn insert(&self, ev: &ModelEvaluation) -> Result<i64, DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!(
                "INSERT INTO model_evaluations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                &SELECT_COLS["id, ".len()..]
            ),
            params![
                ev.report_id,
                ev.model_id,
                ev.ticker_code,
                fmt_ts(&ev.predicted_at),
                ev.base_price,
                ev.predicted_target,
                ev.predicted_support,
                ev.actual_high_1d,
                ev.actual_low_1d,
                ev.actual_close_1d,
                ev.actual_high_5d,
                ev.actual_low_5d,
                ev.actual_close_5d,
                ev.target_achieved as i32,
                ev.target_achieved_days,
                ev.support_breached as i32,
                ev.target_accuracy_score,
                ev.timing_score,
                ev.risk_management_score,
                ev.human_rating_quality,
                ev.human_rating_usefulness,
                ev.human_rating_overall,
                ev.human_evaluated_at.as_ref().map(fmt_ts),
                ev.final_score,
                fmt_ts(&ev.evaluated_at),
            ],
        )
        .map_err(DomainError::from)?;
        Ok(conn.last_insert_rowid())
    }

    fn exists(&self, report_id: i64, model_id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM model_evaluations WHERE report_id = ?1 AND model_id = ?2",
                params![report_id, model_id],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn get(&self, id: i64) -> Result<Option<ModelEvaluation>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM model_evaluations WHERE id = ?1"),
            params![id],
            Self::row_to_evaluation,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn list_for_report(&self, report_id: i64) -> Result<Vec<ModelEvaluation>, DomainError> {
        self.list(
            &format!("SELECT {SELECT_COLS} FROM model_evaluations WHERE report_id = ?1 ORDER BY model_id"),
            &[&report_id],
        )
    }

    fn set_human_rating(
        &self,
        id: i64,
        ratings: HumanRatings,
        final_score: f64,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let changed = conn
            .execute(
                "UPDATE model_evaluations SET human_rating_quality = ?1, human_rating_usefulness = ?2,
                    human_rating_overall = ?3, human_evaluated_at = ?4, final_score = ?5
                 WHERE id = ?6",
                params![ratings.quality, ratings.usefulness, ratings.overall, fmt_ts(&at), final_score, id],
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("evaluation {id}")));
        }
        Ok(())
    }

    fn list_predicted_on(&self, date: NaiveDate) -> Result<Vec<ModelEvaluation>, DomainError> {
        let (from, to) = kst_day_bounds(date);
        self.list(
            &format!(
                "SELECT {SELECT_COLS} FROM model_evaluations WHERE predicted_at >= ?1 AND predicted_at < ?2 ORDER BY model_id, id"
            ),
            &[&fmt_ts(&from), &fmt_ts(&to)],
        )
    }

    fn upsert_daily_performance(&self, p: &DailyModelPerformance) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO daily_model_performance (model_id, date, total_predictions, evaluated_count, human_evaluated_count, avg_final_score, avg_auto_score, avg_human_score, avg_target_accuracy, avg_timing_score, avg_risk_management, target_achieved_rate, support_breach_rate, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(model_id, date) DO UPDATE SET
                total_predictions = excluded.total_predictions, evaluated_count = excluded.evaluated_count,
                human_evaluated_count = excluded.human_evaluated_count, avg_final_score = excluded.avg_final_score,
                avg_auto_score = excluded.avg_auto_score, avg_human_score = excluded.avg_human_score,
                avg_target_accuracy = excluded.avg_target_accuracy, avg_timing_score = excluded.avg_timing_score,
                avg_risk_management = excluded.avg_risk_management, target_achieved_rate = excluded.target_achieved_rate,
                support_breach_rate = excluded.support_breach_rate, updated_at = excluded.updated_at",
            params![
                p.model_id,
                fmt_date(&p.date),
                p.total_predictions,
                p.evaluated_count,
                p.human_evaluated_count,
                p.avg_final_score,
                p.avg_auto_score,
                p.avg_human_score,
                p.avg_target_accuracy,
                p.avg_timing_score,
                p.avg_risk_management,
                p.target_achieved_rate,
                p.support_breach_rate,
                fmt_ts(&p.updated_at),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to upsert daily performance: {e}")))?;
        Ok(())
    }

    fn daily_performance(&self, date: NaiveDate) -> Result<Vec<DailyModelPerformance>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT model_id, date, total_predictions, evaluated_count, human_evaluated_count, avg_final_score, avg_auto_score, avg_human_score, avg_target_accuracy, avg_timing_score, avg_risk_management, target_achieved_rate, support_breach_rate, updated_at
                 FROM daily_model_performance WHERE date = ?1 ORDER BY model_id",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![fmt_date(&date)], |row| {
                let d: String = row.get(1)?;
                let updated: String = row.get(13)?;
                Ok(DailyModelPerformance {
                    model_id: row.get(0)?,
                    date: parse_date(&d)?,
                    total_predictions: row.get(2)?,
                    evaluated_count: row.get(3)?,
                    human_evaluated_count: row.get(4)?,
                    avg_final_score: row.get(5)?,
                    avg_auto_score: row.get(6)?,
                    avg_human_score: row.get(7)?,
                    avg_target_accuracy: row.get(8)?,
                    avg_timing_score: row.get(9)?,
                    avg_risk_management: row.get(10)?,
                    target_achieved_rate: row.get(11)?,
                    support_breach_rate: row.get(12)?,
                    updated_at: parse_ts(&updated),
                })
            })
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}
