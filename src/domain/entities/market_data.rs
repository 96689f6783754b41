//! Time-stamped market snapshots. Dates and datetimes are KST wall-clock values.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar, unique on (code, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// One-minute bar, unique on (code, datetime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub code: String,
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Ten-level order book snapshot, unique on (code, datetime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub code: String,
    pub datetime: NaiveDateTime,
    pub ask_prices: Vec<f64>,
    pub ask_volumes: Vec<i64>,
    pub bid_prices: Vec<f64>,
    pub bid_volumes: Vec<i64>,
    pub total_ask_volume: i64,
    pub total_bid_volume: i64,
}

/// Intraday quote, unique on (code, datetime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPriceSnapshot {
    pub code: String,
    pub datetime: NaiveDateTime,
    pub price: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub change: Option<f64>,
    pub change_sign: Option<String>,
    pub change_rate: Option<f64>,
    pub volume: Option<i64>,
    pub trading_value: Option<i64>,
}

/// Net buying by investor class, unique on (code, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorFlow {
    pub code: String,
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub individual_net_qty: i64,
    pub foreign_net_qty: i64,
    pub institution_net_qty: i64,
    pub individual_net_value: i64,
    pub foreign_net_value: i64,
    pub institution_net_value: i64,
}

/// Sector index quote, unique on (sector_code, datetime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorIndexSnapshot {
    pub sector_code: String,
    pub datetime: NaiveDateTime,
    pub value: f64,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
    pub volume: Option<i64>,
    pub trading_value: Option<i64>,
}

/// After-hours single-price trading, unique on (code, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimePrice {
    pub code: String,
    pub date: NaiveDate,
    pub price: f64,
    pub change: Option<f64>,
    pub change_sign: Option<String>,
    pub change_rate: Option<f64>,
    pub volume: Option<i64>,
    pub trading_value: Option<i64>,
}

/// Daily bar of a market or sector index, unique on (index_code, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDailyBar {
    pub index_code: String,
    pub index_name: Option<String>,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<i64>,
    pub trading_value: Option<i64>,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
}

/// Static company facts, unique on code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub code: String,
    pub name: Option<String>,
    pub industry_code: Option<String>,
    pub industry_name: Option<String>,
    pub market_cap: Option<i64>,
    pub listed_shares: Option<i64>,
    pub capital: Option<i64>,
}

/// Realised close-to-close change after an item's publication, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceChanges {
    #[serde(rename = "1d")]
    pub d1: Option<f64>,
    #[serde(rename = "2d")]
    pub d2: Option<f64>,
    #[serde(rename = "3d")]
    pub d3: Option<f64>,
    #[serde(rename = "5d")]
    pub d5: Option<f64>,
    #[serde(rename = "10d")]
    pub d10: Option<f64>,
    #[serde(rename = "20d")]
    pub d20: Option<f64>,
}

impl PriceChanges {
    pub const HORIZONS: [i64; 6] = [1, 2, 3, 5, 10, 20];

    pub fn set(&mut self, days: i64, value: Option<f64>) {
        match days {
            1 => self.d1 = value,
            2 => self.d2 = value,
            3 => self.d3 = value,
            5 => self.d5 = value,
            10 => self.d10 = value,
            20 => self.d20 = value,
            _ => {}
        }
    }

    pub fn get(&self, days: i64) -> Option<f64> {
        match days {
            1 => self.d1,
            2 => self.d2,
            3 => self.d3,
            5 => self.d5,
            10 => self.d10,
            20 => self.d20,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        Self::HORIZONS.iter().all(|d| self.get(*d).is_none())
    }

    pub fn is_complete(&self) -> bool {
        Self::HORIZONS.iter().all(|d| self.get(*d).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPriceMatch {
    pub content_item_id: i64,
    pub ticker_code: String,
    pub changes: PriceChanges,
    pub calculated_at: chrono::DateTime<chrono::Utc>,
}
