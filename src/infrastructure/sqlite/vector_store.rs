use super::{fmt_ts, lock, parse_ts, SharedConnection};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::*;
use rusqlite::{params, OptionalExtension};

/// Embedding table with brute-force L2 search. Filters on ticker and publish
/// time run in SQL; scoring runs over the surviving rows.
pub struct SqliteVectorStore {
    conn: SharedConnection,
}

impl SqliteVectorStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn l2_distance(a: &[f32], b: &[f32]) -> Option<f64> {
        if a.len() != b.len() || a.is_empty() {
            return None;
        }
        let sum: f64 = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = *x as f64 - *y as f64;
                d * d
            })
            .sum();
        Some(sum.sqrt())
    }

    fn serialize_vector(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, record: &EmbeddingRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (content_item_id, vector, dimension, ticker_code, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.content_item_id,
                Self::serialize_vector(&record.vector),
                record.vector.len() as i64,
                record.ticker_code,
                fmt_ts(&record.published_at),
            ],
        )
        .map_err(|e| DomainError::Embedding(format!("Failed to store vector: {e}")))?;
        Ok(())
    }

    fn search(&self, vector: &[f32], query: &VectorQuery<'_>) -> Result<Vec<VectorHit>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = String::from(
            "SELECT content_item_id, vector, ticker_code, published_at FROM embeddings WHERE dimension = ?1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(vector.len() as i64)];

        if let Some(ticker) = query.ticker {
            sql.push_str(&format!(" AND ticker_code = ?{}", param_values.len() + 1));
            param_values.push(Box::new(ticker.to_string()));
        }
        if let Some(since) = &query.published_since {
            sql.push_str(&format!(" AND published_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(since)));
        }
        if let Some(exclude) = query.exclude_id {
            sql.push_str(&format!(" AND content_item_id != ?{}", param_values.len() + 1));
            param_values.push(Box::new(exclude));
        }
        if let Some(before) = query.before_id {
            sql.push_str(&format!(" AND content_item_id < ?{}", param_values.len() + 1));
            param_values.push(Box::new(before));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                let id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                let ticker: Option<String> = row.get(2)?;
                let published: String = row.get(3)?;
                Ok((id, blob, ticker, published))
            })
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, blob, ticker_code, published) = row.map_err(|e| DomainError::Database(e.to_string()))?;
            let stored = Self::deserialize_vector(&blob);
            if let Some(distance) = Self::l2_distance(vector, &stored) {
                hits.push(VectorHit {
                    content_item_id: id,
                    ticker_code,
                    published_at: parse_ts(&published),
                    distance,
                    similarity: 1.0 / (1.0 + distance),
                });
            }
        }

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.limit);
        Ok(hits)
    }

    fn has_vector(&self, content_item_id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM embeddings WHERE content_item_id = ?1",
                params![content_item_id],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn delete(&self, content_item_id: i64) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute("DELETE FROM embeddings WHERE content_item_id = ?1", params![content_item_id])
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(())
    }

    fn count(&self) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    fn stored_dimension(&self) -> Result<Option<usize>, DomainError> {
        let conn = lock(&self.conn)?;
        let dim: Option<i64> = conn
            .query_row("SELECT dimension FROM embeddings LIMIT 1", [], |r| r.get(0))
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(dim.map(|d| d as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::open_connection;
    use chrono::Utc;

    fn record(id: i64, vector: Vec<f32>, ticker: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            content_item_id: id,
            vector,
            ticker_code: Some(ticker.to_string()),
            published_at: Utc::now(),
        }
    }

    fn store_with_items(ids: &[i64]) -> SqliteVectorStore {
        let conn = open_connection(":memory:").unwrap();
        {
            let c = conn.lock().unwrap();
            c.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
            for id in ids {
                c.execute(
                    "INSERT INTO content_items (id, title, published_at, source, content_type, created_at) VALUES (?1, ?2, ?3, 'test', 'news', ?3)",
                    params![id, format!("item {id}"), fmt_ts(&Utc::now())],
                )
                .unwrap();
            }
        }
        SqliteVectorStore::new(conn)
    }

    #[test]
    fn test_l2_search_filters_ticker_and_orders_by_distance() {
        let store = store_with_items(&[1, 2, 3]);
        store.upsert(&record(1, vec![1.0, 0.0], "005930")).unwrap();
        store.upsert(&record(2, vec![0.0, 1.0], "005930")).unwrap();
        store.upsert(&record(3, vec![1.0, 0.0], "000660")).unwrap();

        let hits = store
            .search(
                &[1.0, 0.0],
                &VectorQuery {
                    ticker: Some("005930"),
                    limit: 10,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content_item_id, 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-9);
        assert!((hits[1].similarity - 1.0 / (1.0 + 2f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_before_id_keeps_only_earlier_items() {
        let store = store_with_items(&[1, 2, 3]);
        for id in [1, 2, 3] {
            store.upsert(&record(id, vec![1.0, 0.0], "005930")).unwrap();
        }

        let hits = store
            .search(
                &[1.0, 0.0],
                &VectorQuery {
                    before_id: Some(2),
                    limit: 10,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.content_item_id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_upsert_replaces_existing_record() {
        let store = store_with_items(&[1]);
        store.upsert(&record(1, vec![1.0, 0.0], "005930")).unwrap();
        store.upsert(&record(1, vec![0.0, 1.0], "005930")).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.stored_dimension().unwrap(), Some(2));
    }
}
