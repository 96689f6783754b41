//! Typed KIS quotations endpoints and their response parsers.

use super::client::KisClient;
use super::KisError;
use crate::domain::entities::market_data::*;
use crate::domain::error::DomainError;
use crate::domain::ports::market_data_source::MarketDataSource;
use crate::domain::values::index_catalog::index_name;
use crate::domain::values::market_calendar::kst_now;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;

const QUOTATIONS: &str = "/uapi/domestic-stock/v1/quotations";

pub mod tr_id {
    pub const DAILY_CHART: &str = "FHKST03010100";
    pub const CURRENT_PRICE: &str = "FHKST01010100";
    pub const MINUTE_CHART: &str = "FHKST03010200";
    pub const DAILY_MINUTE_CHART: &str = "FHKST03010230";
    pub const ORDERBOOK: &str = "FHKST01010200";
    pub const INVESTOR: &str = "FHKST01010900";
    pub const STOCK_INFO: &str = "FHKST01010300";
    pub const SECTOR_INDEX: &str = "FHKUP03500100";
    pub const INDEX_DAILY: &str = "FHPUP02120000";
    pub const OVERTIME_PRICE: &str = "FHPST02300000";
    pub const OVERTIME_DAILY: &str = "FHPST02320000";
}

/// [`MarketDataSource`] backed by the KIS REST API.
pub struct KisMarketData {
    client: KisClient,
}

impl KisMarketData {
    pub fn new(client: KisClient) -> Self {
        Self { client }
    }

    async fn quote(&self, path: &str, tr: &str, query: &[(&str, String)]) -> Result<Value, DomainError> {
        self.client
            .get(&format!("{QUOTATIONS}/{path}"), tr, query)
            .await
            .map_err(DomainError::from)
    }
}

fn stock_query(code: &str) -> Vec<(&'static str, String)> {
    vec![
        ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
        ("FID_INPUT_ISCD", code.to_string()),
    ]
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// KIS sends numbers as strings; blanks mean absent.
fn num(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn int(obj: &Value, key: &str) -> Option<i64> {
    num(obj, key).map(|v| v as i64)
}

fn text(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn date_field(obj: &Value, key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(obj.get(key)?.as_str()?, "%Y%m%d").ok()
}

fn output<'a>(json: &'a Value, key: &str) -> Result<&'a Value, KisError> {
    json.get(key)
        .ok_or_else(|| KisError::Parse(format!("missing '{key}' in response")))
}

fn rows<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    json.get(key).and_then(|v| v.as_array()).map(Vec::as_slice).unwrap_or(&[])
}

/// Wall-clock KST minute used as the key of intraday snapshots.
fn snapshot_time() -> NaiveDateTime {
    let now = kst_now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

pub fn parse_daily_chart(code: &str, json: &Value) -> Vec<DailyBar> {
    let mut bars: Vec<DailyBar> = rows(json, "output2")
        .iter()
        .filter_map(|r| {
            Some(DailyBar {
                code: code.to_string(),
                date: date_field(r, "stck_bsop_date")?,
                open: num(r, "stck_oprc")?,
                high: num(r, "stck_hgpr")?,
                low: num(r, "stck_lwpr")?,
                close: num(r, "stck_clpr")?,
                volume: int(r, "acml_vol").unwrap_or(0),
            })
        })
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

pub fn parse_minute_chart(code: &str, json: &Value) -> Vec<MinuteBar> {
    let mut bars: Vec<MinuteBar> = rows(json, "output2")
        .iter()
        .filter_map(|r| {
            let date = date_field(r, "stck_bsop_date")?;
            let time = NaiveTime::parse_from_str(r.get("stck_cntg_hour")?.as_str()?, "%H%M%S").ok()?;
            Some(MinuteBar {
                code: code.to_string(),
                datetime: date.and_time(time),
                open: num(r, "stck_oprc")?,
                high: num(r, "stck_hgpr")?,
                low: num(r, "stck_lwpr")?,
                close: num(r, "stck_prpr")?,
                volume: int(r, "cntg_vol").unwrap_or(0),
            })
        })
        .collect();
    bars.sort_by_key(|b| b.datetime);
    bars
}

pub fn parse_orderbook(code: &str, datetime: NaiveDateTime, json: &Value) -> Result<OrderbookSnapshot, KisError> {
    let out = output(json, "output1")?;
    let level = |prefix: &str, i: usize| num(out, &format!("{prefix}{i}")).unwrap_or(0.0);
    Ok(OrderbookSnapshot {
        code: code.to_string(),
        datetime,
        ask_prices: (1..=10).map(|i| level("askp", i)).collect(),
        ask_volumes: (1..=10).map(|i| level("askp_rsqn", i) as i64).collect(),
        bid_prices: (1..=10).map(|i| level("bidp", i)).collect(),
        bid_volumes: (1..=10).map(|i| level("bidp_rsqn", i) as i64).collect(),
        total_ask_volume: int(out, "total_askp_rsqn").unwrap_or(0),
        total_bid_volume: int(out, "total_bidp_rsqn").unwrap_or(0),
    })
}

pub fn parse_current_price(code: &str, datetime: NaiveDateTime, json: &Value) -> Result<CurrentPriceSnapshot, KisError> {
    let out = output(json, "output")?;
    Ok(CurrentPriceSnapshot {
        code: code.to_string(),
        datetime,
        price: num(out, "stck_prpr").ok_or_else(|| KisError::Parse("missing stck_prpr".into()))?,
        open: num(out, "stck_oprc"),
        high: num(out, "stck_hgpr"),
        low: num(out, "stck_lwpr"),
        change: num(out, "prdy_vrss"),
        change_sign: text(out, "prdy_vrss_sign"),
        change_rate: num(out, "prdy_ctrt"),
        volume: int(out, "acml_vol"),
        trading_value: int(out, "acml_tr_pbmn"),
    })
}

pub fn parse_investor_flows(code: &str, json: &Value) -> Vec<InvestorFlow> {
    rows(json, "output")
        .iter()
        .filter_map(|r| {
            Some(InvestorFlow {
                code: code.to_string(),
                date: date_field(r, "stck_bsop_date")?,
                close: num(r, "stck_clpr"),
                individual_net_qty: int(r, "prsn_ntby_qty")?,
                foreign_net_qty: int(r, "frgn_ntby_qty")?,
                institution_net_qty: int(r, "orgn_ntby_qty")?,
                individual_net_value: int(r, "prsn_ntby_tr_pbmn").unwrap_or(0),
                foreign_net_value: int(r, "frgn_ntby_tr_pbmn").unwrap_or(0),
                institution_net_value: int(r, "orgn_ntby_tr_pbmn").unwrap_or(0),
            })
        })
        .collect()
}

pub fn parse_stock_info(code: &str, json: &Value) -> Result<StockInfo, KisError> {
    let out = output(json, "output")?;
    Ok(StockInfo {
        code: code.to_string(),
        name: text(out, "bstp_kor_isnm").or_else(|| text(out, "prdt_abrv_name")),
        industry_code: text(out, "std_idst_clsf_cd"),
        industry_name: text(out, "std_idst_clsf_cd_name"),
        market_cap: int(out, "hts_avls"),
        listed_shares: int(out, "lstn_stcn"),
        capital: int(out, "cpfn"),
    })
}

pub fn parse_sector_index(sector_code: &str, datetime: NaiveDateTime, json: &Value) -> Result<SectorIndexSnapshot, KisError> {
    let out = output(json, "output")?;
    Ok(SectorIndexSnapshot {
        sector_code: sector_code.to_string(),
        datetime,
        value: num(out, "bstp_nmix_prpr").ok_or_else(|| KisError::Parse("missing bstp_nmix_prpr".into()))?,
        change: num(out, "bstp_nmix_prdy_vrss"),
        change_rate: num(out, "bstp_nmix_prdy_ctrt"),
        volume: int(out, "acml_vol"),
        trading_value: int(out, "acml_tr_pbmn"),
    })
}

pub fn parse_index_daily(index_code: &str, json: &Value) -> Vec<IndexDailyBar> {
    let name = index_name(index_code).map(str::to_string);
    let mut bars: Vec<IndexDailyBar> = rows(json, "output2")
        .iter()
        .filter_map(|r| {
            Some(IndexDailyBar {
                index_code: index_code.to_string(),
                index_name: name.clone(),
                date: date_field(r, "stck_bsop_date")?,
                open: num(r, "bstp_nmix_oprc"),
                high: num(r, "bstp_nmix_hgpr"),
                low: num(r, "bstp_nmix_lwpr"),
                close: num(r, "bstp_nmix_prpr")?,
                volume: int(r, "acml_vol"),
                trading_value: int(r, "acml_tr_pbmn"),
                change: num(r, "bstp_nmix_prdy_vrss"),
                change_rate: num(r, "bstp_nmix_prdy_ctrt"),
            })
        })
        .collect();
    bars.sort_by_key(|b| b.date);
    bars
}

pub fn parse_overtime_price(code: &str, date: NaiveDate, json: &Value) -> Result<OvertimePrice, KisError> {
    let out = output(json, "output")?;
    Ok(OvertimePrice {
        code: code.to_string(),
        date,
        price: num(out, "ovtm_untp_prpr").ok_or_else(|| KisError::Parse("missing ovtm_untp_prpr".into()))?,
        change: num(out, "ovtm_untp_prdy_vrss"),
        change_sign: text(out, "prdy_vrss_sign"),
        change_rate: num(out, "ovtm_untp_prdy_ctrt"),
        volume: int(out, "acml_vol"),
        trading_value: int(out, "acml_tr_pbmn"),
    })
}

pub fn parse_overtime_daily(code: &str, json: &Value) -> Vec<OvertimePrice> {
    rows(json, "output2")
        .iter()
        .filter_map(|r| {
            Some(OvertimePrice {
                code: code.to_string(),
                date: date_field(r, "stck_bsop_date")?,
                price: num(r, "ovtm_untp_prpr")?,
                change: num(r, "ovtm_untp_prdy_vrss"),
                change_sign: text(r, "prdy_vrss_sign"),
                change_rate: num(r, "ovtm_untp_prdy_ctrt"),
                volume: int(r, "acml_vol"),
                trading_value: int(r, "acml_tr_pbmn"),
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl MarketDataSource for KisMarketData {
    async fn daily_chart(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyBar>, DomainError> {
        let mut query = stock_query(code);
        query.extend([
            ("FID_INPUT_DATE_1", ymd(from)),
            ("FID_INPUT_DATE_2", ymd(to)),
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ("FID_ORG_ADJ_PRC", "0".to_string()),
        ]);
        let json = self.quote("inquire-daily-itemchartprice", tr_id::DAILY_CHART, &query).await?;
        Ok(parse_daily_chart(code, &json))
    }

    async fn current_price(&self, code: &str) -> Result<CurrentPriceSnapshot, DomainError> {
        let json = self.quote("inquire-price", tr_id::CURRENT_PRICE, &stock_query(code)).await?;
        Ok(parse_current_price(code, snapshot_time(), &json)?)
    }

    async fn minute_chart(&self, code: &str) -> Result<Vec<MinuteBar>, DomainError> {
        let mut query = stock_query(code);
        query.extend([
            ("FID_INPUT_HOUR_1", kst_now().format("%H%M%S").to_string()),
            ("FID_ETC_CLS_CODE", String::new()),
            ("FID_PW_DATA_INCU_YN", "Y".to_string()),
        ]);
        let json = self.quote("inquire-time-itemchartprice", tr_id::MINUTE_CHART, &query).await?;
        Ok(parse_minute_chart(code, &json))
    }

    async fn minute_chart_on(&self, code: &str, date: NaiveDate) -> Result<Vec<MinuteBar>, DomainError> {
        let mut query = stock_query(code);
        query.extend([
            ("FID_INPUT_DATE_1", ymd(date)),
            ("FID_INPUT_HOUR_1", "153000".to_string()),
            ("FID_PW_DATA_INCU_YN", "Y".to_string()),
        ]);
        let json = self.quote("inquire-time-dailychartprice", tr_id::DAILY_MINUTE_CHART, &query).await?;
        Ok(parse_minute_chart(code, &json))
    }

    async fn orderbook(&self, code: &str) -> Result<OrderbookSnapshot, DomainError> {
        let json = self.quote("inquire-asking-price-exp-ccn", tr_id::ORDERBOOK, &stock_query(code)).await?;
        Ok(parse_orderbook(code, snapshot_time(), &json)?)
    }

    async fn investor_flows(&self, code: &str) -> Result<Vec<InvestorFlow>, DomainError> {
        let today = kst_now().date_naive();
        let mut query = stock_query(code);
        query.extend([
            ("FID_INPUT_DATE_1", ymd(today - Duration::days(30))),
            ("FID_INPUT_DATE_2", ymd(today)),
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
        ]);
        let json = self.quote("inquire-investor", tr_id::INVESTOR, &query).await?;
        Ok(parse_investor_flows(code, &json))
    }

    async fn stock_info(&self, code: &str) -> Result<StockInfo, DomainError> {
        let json = self.quote("search-stock-info", tr_id::STOCK_INFO, &stock_query(code)).await?;
        Ok(parse_stock_info(code, &json)?)
    }

    async fn sector_index(&self, sector_code: &str) -> Result<SectorIndexSnapshot, DomainError> {
        let query = vec![
            ("FID_COND_MRKT_DIV_CODE", "U".to_string()),
            ("FID_INPUT_ISCD", sector_code.to_string()),
        ];
        let json = self.quote("inquire-index-price", tr_id::SECTOR_INDEX, &query).await?;
        Ok(parse_sector_index(sector_code, snapshot_time(), &json)?)
    }

    async fn index_daily(&self, index_code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<IndexDailyBar>, DomainError> {
        let query = vec![
            ("FID_PERIOD_DIV_CODE", "D".to_string()),
            ("FID_COND_MRKT_DIV_CODE", "U".to_string()),
            ("FID_INPUT_ISCD", index_code.to_string()),
            ("FID_INPUT_DATE_1", ymd(to)),
        ];
        let json = self.quote("inquire-index-daily-price", tr_id::INDEX_DAILY, &query).await?;
        Ok(parse_index_daily(index_code, &json)
            .into_iter()
            .filter(|b| b.date >= from && b.date <= to)
            .collect())
    }

    async fn overtime_price(&self, code: &str) -> Result<OvertimePrice, DomainError> {
        let json = self.quote("inquire-overtime-price", tr_id::OVERTIME_PRICE, &stock_query(code)).await?;
        Ok(parse_overtime_price(code, kst_now().date_naive(), &json)?)
    }

    async fn overtime_daily(&self, code: &str) -> Result<Vec<OvertimePrice>, DomainError> {
        let json = self.quote("inquire-daily-overtimeprice", tr_id::OVERTIME_DAILY, &stock_query(code)).await?;
        Ok(parse_overtime_daily(code, &json))
    }
}
