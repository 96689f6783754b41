use super::{fmt_date, fmt_datetime, fmt_ts, lock, parse_date, parse_datetime, parse_ts, SharedConnection};
use crate::domain::entities::market_data::*;
use crate::domain::error::DomainError;
use crate::domain::ports::market_data_repository::{MarketDataRepository, MarketTable};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

pub struct SqliteMarketDataRepo {
    conn: SharedConnection,
}

impl SqliteMarketDataRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Runs `write` for every row inside one transaction.
    fn upsert_batch<T>(
        &self,
        rows: &[T],
        sql: &str,
        write: impl Fn(&mut rusqlite::CachedStatement<'_>, &T) -> rusqlite::Result<usize>,
    ) -> Result<usize, DomainError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = lock(&self.conn)?;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached(sql)
                .map_err(|e| DomainError::Database(e.to_string()))?;
            for row in rows {
                written += write(&mut stmt, row).map_err(|e| DomainError::Database(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to commit upsert: {e}")))?;
        Ok(written)
    }

    fn row_to_daily(row: &rusqlite::Row) -> Result<DailyBar, rusqlite::Error> {
        let date: String = row.get(1)?;
        Ok(DailyBar {
            code: row.get(0)?,
            date: parse_date(&date)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            close: row.get(5)?,
            volume: row.get(6)?,
        })
    }

    fn daily_query(&self, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<DailyBar>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_daily)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }
}

const DAILY_COLS: &str = "code, date, open, high, low, close, volume";

impl MarketDataRepository for SqliteMarketDataRepo {
    fn upsert_daily_bars(&self, bars: &[DailyBar]) -> Result<usize, DomainError> {
        self.upsert_batch(
            bars,
            "INSERT INTO ohlcv_daily (code, date, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(code, date) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume",
            |stmt, b| {
                stmt.execute(params![b.code, fmt_date(&b.date), b.open, b.high, b.low, b.close, b.volume])
            },
        )
    }

    fn upsert_minute_bars(&self, bars: &[MinuteBar]) -> Result<usize, DomainError> {
        self.upsert_batch(
            bars,
            "INSERT INTO ohlcv_minute (code, datetime, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(code, datetime) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume",
            |stmt, b| {
                stmt.execute(params![b.code, fmt_datetime(&b.datetime), b.open, b.high, b.low, b.close, b.volume])
            },
        )
    }

    fn upsert_orderbook(&self, s: &OrderbookSnapshot) -> Result<usize, DomainError> {
        self.upsert_batch(
            std::slice::from_ref(s),
            "INSERT INTO orderbook (code, datetime, ask_prices, ask_volumes, bid_prices, bid_volumes, total_ask_volume, total_bid_volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(code, datetime) DO UPDATE SET
                ask_prices = excluded.ask_prices, ask_volumes = excluded.ask_volumes,
                bid_prices = excluded.bid_prices, bid_volumes = excluded.bid_volumes,
                total_ask_volume = excluded.total_ask_volume, total_bid_volume = excluded.total_bid_volume",
            |stmt, s| {
                stmt.execute(params![
                    s.code,
                    fmt_datetime(&s.datetime),
                    serde_json::to_string(&s.ask_prices).unwrap_or_default(),
                    serde_json::to_string(&s.ask_volumes).unwrap_or_default(),
                    serde_json::to_string(&s.bid_prices).unwrap_or_default(),
                    serde_json::to_string(&s.bid_volumes).unwrap_or_default(),
                    s.total_ask_volume,
                    s.total_bid_volume,
                ])
            },
        )
    }

    fn upsert_current_price(&self, s: &CurrentPriceSnapshot) -> Result<usize, DomainError> {
        self.upsert_batch(
            std::slice::from_ref(s),
            "INSERT INTO current_price (code, datetime, price, open, high, low, change, change_sign, change_rate, volume, trading_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(code, datetime) DO UPDATE SET
                price = excluded.price, open = excluded.open, high = excluded.high, low = excluded.low,
                change = excluded.change, change_sign = excluded.change_sign, change_rate = excluded.change_rate,
                volume = excluded.volume, trading_value = excluded.trading_value",
            |stmt, s| {
                stmt.execute(params![
                    s.code,
                    fmt_datetime(&s.datetime),
                    s.price,
                    s.open,
                    s.high,
                    s.low,
                    s.change,
                    s.change_sign,
                    s.change_rate,
                    s.volume,
                    s.trading_value,
                ])
            },
        )
    }

    fn upsert_investor_flows(&self, flows: &[InvestorFlow]) -> Result<usize, DomainError> {
        self.upsert_batch(
            flows,
            "INSERT INTO investor_flow (code, date, close, individual_net_qty, foreign_net_qty, institution_net_qty, individual_net_value, foreign_net_value, institution_net_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(code, date) DO UPDATE SET
                close = excluded.close,
                individual_net_qty = excluded.individual_net_qty, foreign_net_qty = excluded.foreign_net_qty,
                institution_net_qty = excluded.institution_net_qty, individual_net_value = excluded.individual_net_value,
                foreign_net_value = excluded.foreign_net_value, institution_net_value = excluded.institution_net_value",
            |stmt, f| {
                stmt.execute(params![
                    f.code,
                    fmt_date(&f.date),
                    f.close,
                    f.individual_net_qty,
                    f.foreign_net_qty,
                    f.institution_net_qty,
                    f.individual_net_value,
                    f.foreign_net_value,
                    f.institution_net_value,
                ])
            },
        )
    }

    fn upsert_sector_index(&self, s: &SectorIndexSnapshot) -> Result<usize, DomainError> {
        self.upsert_batch(
            std::slice::from_ref(s),
            "INSERT INTO sector_index (sector_code, datetime, value, change, change_rate, volume, trading_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(sector_code, datetime) DO UPDATE SET
                value = excluded.value, change = excluded.change, change_rate = excluded.change_rate,
                volume = excluded.volume, trading_value = excluded.trading_value",
            |stmt, s| {
                stmt.execute(params![
                    s.sector_code,
                    fmt_datetime(&s.datetime),
                    s.value,
                    s.change,
                    s.change_rate,
                    s.volume,
                    s.trading_value,
                ])
            },
        )
    }

    fn upsert_overtime_prices(&self, prices: &[OvertimePrice]) -> Result<usize, DomainError> {
        self.upsert_batch(
            prices,
            "INSERT INTO overtime_price (code, date, price, change, change_sign, change_rate, volume, trading_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(code, date) DO UPDATE SET
                price = excluded.price, change = excluded.change, change_sign = excluded.change_sign,
                change_rate = excluded.change_rate, volume = excluded.volume, trading_value = excluded.trading_value",
            |stmt, p| {
                stmt.execute(params![
                    p.code,
                    fmt_date(&p.date),
                    p.price,
                    p.change,
                    p.change_sign,
                    p.change_rate,
                    p.volume,
                    p.trading_value,
                ])
            },
        )
    }

    fn upsert_index_daily(&self, bars: &[IndexDailyBar]) -> Result<usize, DomainError> {
        self.upsert_batch(
            bars,
            "INSERT INTO index_daily (index_code, index_name, date, open, high, low, close, volume, trading_value, change, change_rate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(index_code, date) DO UPDATE SET
                index_name = COALESCE(excluded.index_name, index_daily.index_name),
                open = excluded.open, high = excluded.high, low = excluded.low, close = excluded.close,
                volume = excluded.volume, trading_value = excluded.trading_value,
                change = excluded.change, change_rate = excluded.change_rate",
            |stmt, b| {
                stmt.execute(params![
                    b.index_code,
                    b.index_name,
                    fmt_date(&b.date),
                    b.open,
                    b.high,
                    b.low,
                    b.close,
                    b.volume,
                    b.trading_value,
                    b.change,
                    b.change_rate,
                ])
            },
        )
    }

    fn upsert_stock_info(&self, info: &StockInfo) -> Result<usize, DomainError> {
        let now = fmt_ts(&Utc::now());
        self.upsert_batch(
            std::slice::from_ref(info),
            "INSERT INTO stock_info (code, name, industry_code, industry_name, market_cap, listed_shares, capital, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(code) DO UPDATE SET
                name = COALESCE(excluded.name, stock_info.name),
                industry_code = excluded.industry_code, industry_name = excluded.industry_name,
                market_cap = excluded.market_cap, listed_shares = excluded.listed_shares,
                capital = excluded.capital, updated_at = excluded.updated_at",
            |stmt, i| {
                stmt.execute(params![
                    i.code,
                    i.name,
                    i.industry_code,
                    i.industry_name,
                    i.market_cap,
                    i.listed_shares,
                    i.capital,
                    now,
                ])
            },
        )
    }

    fn daily_bars_after(&self, code: &str, date: NaiveDate, limit: usize) -> Result<Vec<DailyBar>, DomainError> {
        self.daily_query(
            &format!("SELECT {DAILY_COLS} FROM ohlcv_daily WHERE code = ?1 AND date > ?2 ORDER BY date ASC LIMIT ?3"),
            &[&code, &fmt_date(&date), &(limit as i64)],
        )
    }

    fn daily_bar_on(&self, code: &str, date: NaiveDate) -> Result<Option<DailyBar>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {DAILY_COLS} FROM ohlcv_daily WHERE code = ?1 AND date = ?2"),
            params![code, fmt_date(&date)],
            Self::row_to_daily,
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn latest_daily_bars(&self, code: &str, on_or_before: NaiveDate, limit: usize) -> Result<Vec<DailyBar>, DomainError> {
        self.daily_query(
            &format!("SELECT {DAILY_COLS} FROM ohlcv_daily WHERE code = ?1 AND date <= ?2 ORDER BY date DESC LIMIT ?3"),
            &[&code, &fmt_date(&on_or_before), &(limit as i64)],
        )
    }

    fn daily_bars_between(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyBar>, DomainError> {
        self.daily_query(
            &format!("SELECT {DAILY_COLS} FROM ohlcv_daily WHERE code = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC"),
            &[&code, &fmt_date(&from), &fmt_date(&to)],
        )
    }

    fn latest_current_price_on(&self, code: &str, date: NaiveDate) -> Result<Option<CurrentPriceSnapshot>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            "SELECT code, datetime, price, open, high, low, change, change_sign, change_rate, volume, trading_value
             FROM current_price WHERE code = ?1 AND datetime >= ?2 AND datetime < ?3
             ORDER BY datetime DESC LIMIT 1",
            params![code, fmt_date(&date), fmt_date(&(date + chrono::Duration::days(1)))],
            |row| {
                let dt: String = row.get(1)?;
                Ok(CurrentPriceSnapshot {
                    code: row.get(0)?,
                    datetime: parse_datetime(&dt)?,
                    price: row.get(2)?,
                    open: row.get(3)?,
                    high: row.get(4)?,
                    low: row.get(5)?,
                    change: row.get(6)?,
                    change_sign: row.get(7)?,
                    change_rate: row.get(8)?,
                    volume: row.get(9)?,
                    trading_value: row.get(10)?,
                })
            },
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn overtime_on(&self, code: &str, date: NaiveDate) -> Result<Option<OvertimePrice>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            "SELECT code, date, price, change, change_sign, change_rate, volume, trading_value
             FROM overtime_price WHERE code = ?1 AND date = ?2",
            params![code, fmt_date(&date)],
            |row| {
                let d: String = row.get(1)?;
                Ok(OvertimePrice {
                    code: row.get(0)?,
                    date: parse_date(&d)?,
                    price: row.get(2)?,
                    change: row.get(3)?,
                    change_sign: row.get(4)?,
                    change_rate: row.get(5)?,
                    volume: row.get(6)?,
                    trading_value: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn index_daily_between(&self, index_code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<IndexDailyBar>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT index_code, index_name, date, open, high, low, close, volume, trading_value, change, change_rate
                 FROM index_daily WHERE index_code = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![index_code, fmt_date(&from), fmt_date(&to)], |row| {
                let d: String = row.get(2)?;
                Ok(IndexDailyBar {
                    index_code: row.get(0)?,
                    index_name: row.get(1)?,
                    date: parse_date(&d)?,
                    open: row.get(3)?,
                    high: row.get(4)?,
                    low: row.get(5)?,
                    close: row.get(6)?,
                    volume: row.get(7)?,
                    trading_value: row.get(8)?,
                    change: row.get(9)?,
                    change_rate: row.get(10)?,
                })
            })
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn minute_bars_on(&self, code: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT code, datetime, open, high, low, close, volume FROM ohlcv_minute
                 WHERE code = ?1 AND datetime >= ?2 AND datetime < ?3 ORDER BY datetime ASC",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(
                params![code, fmt_date(&date), fmt_date(&(date + chrono::Duration::days(1)))],
                |row| {
                    let dt: String = row.get(1)?;
                    Ok(MinuteBar {
                        code: row.get(0)?,
                        datetime: parse_datetime(&dt)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                    })
                },
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn upsert_price_match(&self, m: &NewsPriceMatch) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let c = &m.changes;
        conn.execute(
            "INSERT INTO news_price_match (content_item_id, ticker_code, change_1d, change_2d, change_3d, change_5d, change_10d, change_20d, calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(content_item_id) DO UPDATE SET
                ticker_code = excluded.ticker_code,
                change_1d = excluded.change_1d, change_2d = excluded.change_2d, change_3d = excluded.change_3d,
                change_5d = excluded.change_5d, change_10d = excluded.change_10d, change_20d = excluded.change_20d,
                calculated_at = excluded.calculated_at",
            params![m.content_item_id, m.ticker_code, c.d1, c.d2, c.d3, c.d5, c.d10, c.d20, fmt_ts(&m.calculated_at)],
        )
        .map_err(|e| DomainError::Database(format!("Failed to upsert price match: {e}")))?;
        Ok(())
    }

    fn price_match(&self, content_item_id: i64) -> Result<Option<NewsPriceMatch>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            "SELECT content_item_id, ticker_code, change_1d, change_2d, change_3d, change_5d, change_10d, change_20d, calculated_at
             FROM news_price_match WHERE content_item_id = ?1",
            params![content_item_id],
            |row| {
                let calculated: String = row.get(8)?;
                Ok(NewsPriceMatch {
                    content_item_id: row.get(0)?,
                    ticker_code: row.get(1)?,
                    changes: PriceChanges {
                        d1: row.get(2)?,
                        d2: row.get(3)?,
                        d3: row.get(4)?,
                        d5: row.get(5)?,
                        d10: row.get(6)?,
                        d20: row.get(7)?,
                    },
                    calculated_at: parse_ts(&calculated),
                })
            },
        )
        .optional()
        .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn count_rows(&self, table: MarketTable) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.table_name()), [], |r| r.get(0))
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}
