use super::{fmt_ts, lock, parse_ts, parse_ts_opt, SharedConnection};
use crate::domain::entities::content_item::{ContentItem, SocialMetrics};
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::*;
use crate::domain::values::content_type::ContentType;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const SELECT_COLS: &str = "id, title, body, published_at, source, content_type, url, author, company_name, ticker, upvotes, comments, subchannel, metadata, created_at, notified_at";

pub struct SqliteContentRepo {
    conn: SharedConnection,
}

impl SqliteContentRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_item(row: &rusqlite::Row) -> Result<ContentItem, rusqlite::Error> {
        let published_str: String = row.get(3)?;
        let source: String = row.get(4)?;
        let type_str: String = row.get(5)?;
        let upvotes: Option<i64> = row.get(10)?;
        let comments: Option<i64> = row.get(11)?;
        let subchannel: Option<String> = row.get(12)?;
        let metadata_str: Option<String> = row.get(13)?;
        let created_str: String = row.get(14)?;

        let social = match (upvotes, comments) {
            (None, None) => None,
            (u, c) => Some(SocialMetrics {
                upvotes: u.unwrap_or(0),
                comments: c.unwrap_or(0),
                subchannel: subchannel.unwrap_or_default(),
            }),
        };

        Ok(ContentItem {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            published_at: parse_ts(&published_str),
            content_type: type_str.parse().unwrap_or_else(|_| {
                tracing::warn!(content_type = %type_str, "Unknown content type, deriving from source");
                ContentType::from_source(&source)
            }),
            source,
            url: row.get(6)?,
            author: row.get(7)?,
            company_name: row.get(8)?,
            ticker: row.get(9)?,
            social,
            metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: parse_ts(&created_str),
            notified_at: parse_ts_opt(row.get(15)?),
        })
    }

    fn select_where(&self, clause: &str, since: DateTime<Utc>) -> Result<Vec<ContentItem>, DomainError> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {SELECT_COLS} FROM content_items c WHERE c.created_at >= ?1 AND {clause} ORDER BY c.created_at ASC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![fmt_ts(&since)], Self::row_to_item)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

impl ContentRepository for SqliteContentRepo {
    fn insert_if_novel(
        &self,
        item: &ContentItem,
        since: DateTime<Utc>,
        is_duplicate: DuplicateCheck<'_>,
    ) -> Result<Option<i64>, DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let recent = {
            let mut stmt = tx
                .prepare("SELECT title, source, content_type FROM content_items WHERE created_at >= ?1")
                .map_err(|e| DomainError::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![fmt_ts(&since)], |row| {
                    let source: String = row.get(1)?;
                    let type_str: String = row.get(2)?;
                    Ok(RecentTitle {
                        title: row.get(0)?,
                        content_type: type_str.parse().unwrap_or_else(|_| ContentType::from_source(&source)),
                        source,
                    })
                })
                .map_err(|e| DomainError::Database(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| DomainError::Database(e.to_string()))?
        };

        if is_duplicate(item, &recent) {
            return Ok(None);
        }

        let social = item.social.as_ref();
        let inserted = tx.execute(
            "INSERT INTO content_items (title, body, published_at, source, content_type, url, author, company_name, ticker, upvotes, comments, subchannel, metadata, created_at, notified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                item.title,
                item.body,
                fmt_ts(&item.published_at),
                item.source,
                item.content_type.to_string(),
                item.url,
                item.author,
                item.company_name,
                item.ticker,
                social.map(|s| s.upvotes),
                social.map(|s| s.comments),
                social.map(|s| s.subchannel.clone()),
                item.metadata.as_ref().map(|m| m.to_string()),
                fmt_ts(&item.created_at),
                item.notified_at.as_ref().map(fmt_ts),
            ],
        );
        if let Err(e) = inserted {
            return match DomainError::from(e) {
                DomainError::Duplicate(_) => Ok(None),
                other => Err(other),
            };
        }
        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to commit item: {e}")))?;
        Ok(Some(id))
    }

    fn get_by_id(&self, id: i64) -> Result<Option<ContentItem>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM content_items WHERE id = ?1"),
            params![id],
            Self::row_to_item,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn query(&self, filter: &ContentFilter) -> Result<Vec<ContentItem>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM content_items WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ticker) = &filter.ticker {
            sql.push_str(&format!(" AND ticker = ?{}", param_values.len() + 1));
            param_values.push(Box::new(ticker.clone()));
        }
        if let Some(ct) = &filter.content_type {
            sql.push_str(&format!(" AND content_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(ct.to_string()));
        }
        if let Some(since) = &filter.since {
            sql.push_str(&format!(" AND published_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(since)));
        }
        if let Some(until) = &filter.until {
            sql.push_str(&format!(" AND published_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(fmt_ts(until)));
        }
        sql.push_str(" ORDER BY published_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let params_ref: Vec<&dyn rusqlite::types::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params_ref.as_slice(), Self::row_to_item)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn items_missing_embeddings(&self, since: DateTime<Utc>) -> Result<Vec<ContentItem>, DomainError> {
        self.select_where(
            "c.ticker IS NOT NULL AND NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.content_item_id = c.id)",
            since,
        )
    }

    fn items_missing_predictions(&self, since: DateTime<Utc>, model_ids: &[i64]) -> Result<Vec<ContentItem>, DomainError> {
        if model_ids.is_empty() {
            return Ok(Vec::new());
        }
        let missing = model_ids
            .iter()
            .map(|id| {
                format!("NOT EXISTS (SELECT 1 FROM predictions p WHERE p.content_item_id = c.id AND p.model_id = {id})")
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        self.select_where(&format!("c.ticker IS NOT NULL AND ({missing})"), since)
    }

    fn unnotified_since(&self, since: DateTime<Utc>) -> Result<Vec<ContentItem>, DomainError> {
        self.select_where("c.ticker IS NOT NULL AND c.notified_at IS NULL", since)
    }

    fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let changed = conn
            .execute(
                "UPDATE content_items SET notified_at = ?1 WHERE id = ?2 AND notified_at IS NULL",
                params![fmt_ts(&at), id],
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(changed == 1)
    }

    fn was_notified(&self, id: i64) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let notified: Option<Option<String>> = conn
            .query_row(
                "SELECT notified_at FROM content_items WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(matches!(notified, Some(Some(_))))
    }

    fn update_text(&self, id: i64, title: &str, body: &str) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let changed = conn
            .execute(
                "UPDATE content_items SET title = ?1, body = ?2 WHERE id = ?3",
                params![title, body, id],
            )
            .map_err(DomainError::from)?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("content item {id}")));
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute("DELETE FROM content_items WHERE id = ?1", params![id])
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(())
    }

    fn all_ids(&self) -> Result<Vec<i64>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare("SELECT id FROM content_items ORDER BY id")
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| r.get(0))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn stats(&self) -> Result<ContentStats, DomainError> {
        let conn = lock(&self.conn)?;
        let count = |sql: &str| -> Result<usize, DomainError> {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| DomainError::Database(e.to_string()))
        };
        let total_items = count("SELECT COUNT(*) FROM content_items")?;
        let with_ticker = count("SELECT COUNT(*) FROM content_items WHERE ticker IS NOT NULL")?;
        let notified = count("SELECT COUNT(*) FROM content_items WHERE notified_at IS NOT NULL")?;

        let mut stmt = conn
            .prepare("SELECT content_type, COUNT(*) FROM content_items GROUP BY content_type ORDER BY COUNT(*) DESC")
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let by_content_type = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))
            .map_err(|e| DomainError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(ContentStats {
            total_items,
            by_content_type,
            with_ticker,
            notified,
        })
    }
}
