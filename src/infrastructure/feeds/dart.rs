use super::base::{HttpFetcher, DEFAULT_RATE_GAP, DEFAULT_TIMEOUT};
use super::{Feed, FeedError};
use crate::domain::entities::content_item::ContentItem;
use crate::domain::ports::ticker_repository::TickerRepository;
use crate::domain::values::market_calendar::{kst, kst_now};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub const DART_API_URL: &str = "https://opendart.fss.or.kr/api";
pub const DART_SOURCE: &str = "DART(금융감독원)";
const LOOKBACK_DAYS: i64 = 3;
const PAGE_COUNT: usize = 100;

/// OpenDART disclosure list for the core (priority 1-2) watchlist.
pub struct DartFeed {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    tickers: Arc<dyn TickerRepository>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    list: Vec<Disclosure>,
}

#[derive(Debug, Deserialize)]
struct Disclosure {
    #[serde(default)]
    corp_name: String,
    #[serde(default)]
    report_nm: String,
    #[serde(default)]
    rcept_no: String,
    #[serde(default)]
    flr_nm: String,
    #[serde(default)]
    rcept_dt: String,
}

impl DartFeed {
    pub fn new(api_key: Option<String>, tickers: Arc<dyn TickerRepository>) -> Result<Self, FeedError> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("DART API key not configured; disclosure feed disabled");
        }
        Ok(Self {
            http: HttpFetcher::new(DEFAULT_TIMEOUT, DEFAULT_RATE_GAP)?,
            base_url: DART_API_URL.to_string(),
            api_key,
            tickers,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_http(mut self, http: HttpFetcher) -> Self {
        self.http = http;
        self
    }

    /// Disclosures filed for `code` between `from` and `to` (inclusive).
    pub async fn disclosures_for(
        &self,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ContentItem>, FeedError> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };
        let query = [
            ("crtfc_key", key.clone()),
            // OpenDART accepts the 6-digit stock code in corp_code.
            ("corp_code", code.to_string()),
            ("bgn_de", from.format("%Y%m%d").to_string()),
            ("end_de", to.format("%Y%m%d").to_string()),
            ("page_count", PAGE_COUNT.to_string()),
        ];
        let url = format!("{}/list.json", self.base_url);
        let resp: ListResponse = self.http.get_json(&url, &query).await?;

        match resp.status.as_str() {
            "000" => {}
            "013" => return Ok(Vec::new()),
            other => {
                return Err(FeedError::Parse(format!(
                    "DART status {other}: {}",
                    resp.message
                )))
            }
        }

        let now = Utc::now();
        Ok(resp
            .list
            .into_iter()
            .filter(|d| !d.report_nm.trim().is_empty())
            .map(|d| disclosure_to_item(d, now))
            .collect())
    }
}

fn disclosure_to_item(d: Disclosure, now: DateTime<Utc>) -> ContentItem {
    let url = format!("https://dart.fss.or.kr/dsaf001/main.do?rcpNo={}", d.rcept_no);
    let body = format!(
        "[{}] {}\n\n공시일: {}\n공시 제출인: {}\n\n상세보기: {url}",
        d.corp_name, d.report_nm, d.rcept_dt, d.flr_nm
    );
    let published_at = NaiveDate::parse_from_str(&d.rcept_dt, "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| kst().from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    let mut item = ContentItem::new(
        format!("[공시] {}", d.report_nm.trim()),
        body,
        published_at,
        DART_SOURCE.to_string(),
    )
    .with_url(url)
    .with_metadata(serde_json::json!({ "rcept_no": d.rcept_no, "filer": d.flr_nm }));
    if !d.corp_name.is_empty() {
        item = item.with_company_name(d.corp_name);
    }
    item
}

#[async_trait]
impl Feed for DartFeed {
    fn name(&self) -> &str {
        "dart"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ContentItem>, FeedError> {
        if self.api_key.is_none() {
            return Ok(Vec::new());
        }
        let core = self
            .tickers
            .list_by_max_priority(2)
            .map_err(|e| FeedError::Config(e.to_string()))?;

        let to = kst_now().date_naive();
        let from = to - Duration::days(LOOKBACK_DAYS);

        let mut all = Vec::new();
        for ticker in core {
            match self.disclosures_for(&ticker.code, from, to).await {
                Ok(found) => all.extend(found),
                Err(e) => tracing::warn!(ticker = %ticker.code, error = %e, "DART request failed"),
            }
            if all.len() >= limit {
                break;
            }
        }
        all.truncate(limit);
        tracing::info!(feed = self.name(), count = all.len(), "Fetched disclosures");
        Ok(all)
    }
}
