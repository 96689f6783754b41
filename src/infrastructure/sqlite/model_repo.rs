use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::entities::model::{AbConfig, Model};
use crate::domain::error::DomainError;
use crate::domain::ports::model_repository::ModelRepository;
use rusqlite::{params, OptionalExtension};

const MODEL_COLS: &str = "id, name, provider, model_identifier, active, description, created_at";

pub struct SqliteModelRepo {
    conn: SharedConnection,
}

impl SqliteModelRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_model(row: &rusqlite::Row) -> Result<Model, rusqlite::Error> {
        let active: i32 = row.get(4)?;
        let created_str: String = row.get(6)?;
        Ok(Model {
            id: row.get(0)?,
            name: row.get(1)?,
            provider: row.get(2)?,
            model_identifier: row.get(3)?,
            active: active != 0,
            description: row.get(5)?,
            created_at: parse_ts(&created_str),
        })
    }

    fn row_to_ab(row: &rusqlite::Row) -> Result<AbConfig, rusqlite::Error> {
        let active: i32 = row.get(3)?;
        let created_str: String = row.get(4)?;
        Ok(AbConfig {
            id: row.get(0)?,
            model_a_id: row.get(1)?,
            model_b_id: row.get(2)?,
            active: active != 0,
            created_at: parse_ts(&created_str),
        })
    }

    fn find_one(&self, clause: &str, param: &dyn rusqlite::types::ToSql) -> Result<Option<Model>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {MODEL_COLS} FROM models WHERE {clause}"),
            params![param],
            Self::row_to_model,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl ModelRepository for SqliteModelRepo {
    fn add(&self, model: &Model) -> Result<i64, DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO models (name, provider, model_identifier, active, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                model.name,
                model.provider,
                model.model_identifier,
                model.active as i32,
                model.description,
                fmt_ts(&model.created_at),
            ],
        )
        .map_err(DomainError::from)?;
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<Model>, DomainError> {
        self.find_one("id = ?1", &id)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<Model>, DomainError> {
        self.find_one("name = ?1", &name)
    }

    fn find(&self, provider: &str, model_identifier: &str) -> Result<Option<Model>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {MODEL_COLS} FROM models WHERE provider = ?1 AND model_identifier = ?2 ORDER BY id LIMIT 1"),
            params![provider, model_identifier],
            Self::row_to_model,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn list_active(&self) -> Result<Vec<Model>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MODEL_COLS} FROM models WHERE active = 1 ORDER BY id"))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_model)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn activate_ab(&self, config: &AbConfig) -> Result<i64, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        tx.execute("UPDATE ab_configs SET active = 0 WHERE active = 1", [])
            .map_err(|e| DomainError::Database(e.to_string()))?;
        tx.execute(
            "INSERT INTO ab_configs (model_a_id, model_b_id, active, created_at) VALUES (?1, ?2, 1, ?3)",
            params![config.model_a_id, config.model_b_id, fmt_ts(&config.created_at)],
        )
        .map_err(DomainError::from)?;
        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to activate A/B config: {e}")))?;
        Ok(id)
    }

    fn deactivate_ab(&self) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute("UPDATE ab_configs SET active = 0 WHERE active = 1", [])
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(())
    }

    fn active_ab(&self) -> Result<Option<AbConfig>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            "SELECT id, model_a_id, model_b_id, active, created_at FROM ab_configs WHERE active = 1",
            [],
            Self::row_to_ab,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }
}
