use super::base::{HttpFetcher, DEFAULT_TIMEOUT};
use super::naver_news::{collapse, parse_naver_datetime};
use super::{Feed, FeedError};
use crate::domain::entities::content_item::ContentItem;
use crate::domain::ports::ticker_repository::TickerRepository;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};

pub const NAVER_SEARCH_URL: &str = "https://search.naver.com";
const PAGE_SIZE: usize = 10;
const MAX_PAGES: usize = 10;

// Naver's search result markup uses generated class names.
const ITEM_SEL: &str = "div.vs1RfKE1eTzMZ5RqnhIv";
const TITLE_LINK_SEL: &str = "a.VVZqvAlvnADQu8BVMc2n";
const TITLE_TEXT_SEL: &str = ".sds-comps-text-type-headline1";
const SUMMARY_LINK_SEL: &str = "a.IHHP42o8XWWWUySDAoa1";
const SUMMARY_TEXT_SEL: &str = ".sds-comps-text-ellipsis-3";
const PRESS_SEL: &str = ".sds-comps-profile-info-title-text a span";
const DATE_SEL: &str = ".sds-comps-profile-info-subtext .U1zN1wdZWj0pyvj9oyR0 span";

/// Naver news search, one query per watchlist ticker.
pub struct NaverSearchFeed {
    http: HttpFetcher,
    base_url: String,
    tickers: Arc<dyn TickerRepository>,
}

impl NaverSearchFeed {
    pub fn new(tickers: Arc<dyn TickerRepository>) -> Result<Self, FeedError> {
        Ok(Self {
            http: HttpFetcher::new(DEFAULT_TIMEOUT, std::time::Duration::from_millis(500))?,
            base_url: NAVER_SEARCH_URL.to_string(),
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

    fn search_url(&self, query: &str, page: usize) -> String {
        format!(
            "{}/search.naver?where=news&query={}&sort=1&start={}",
            self.base_url,
            urlencoding::encode(query),
            (page - 1) * PAGE_SIZE + 1
        )
    }

    /// Newest-first search for `query`, up to `limit` items.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ContentItem>, FeedError> {
        let mut items = Vec::new();
        let pages = limit.div_ceil(PAGE_SIZE).clamp(1, MAX_PAGES);

        for page in 1..=pages {
            let html = self.http.get_text(&self.search_url(query, page)).await?;
            let parsed = parse_search_page(&html, Utc::now());
            if parsed.is_empty() {
                break;
            }
            items.extend(parsed);
            if items.len() >= limit {
                break;
            }
        }

        items.truncate(limit);
        Ok(items)
    }
}

#[async_trait]
impl Feed for NaverSearchFeed {
    fn name(&self) -> &str {
        "naver_search"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ContentItem>, FeedError> {
        let watchlist = self
            .tickers
            .list_active()
            .map_err(|e| FeedError::Config(e.to_string()))?;

        let mut all = Vec::new();
        for ticker in watchlist {
            if all.len() >= limit {
                break;
            }
            let budget = ticker.priority.search_budget().min(limit - all.len());
            match self.search(&ticker.name, budget).await {
                Ok(found) => {
                    tracing::debug!(ticker = %ticker.code, count = found.len(), "Search results");
                    all.extend(
                        found
                            .into_iter()
                            .map(|item| item.with_company_name(ticker.name.clone())),
                    );
                }
                Err(e) => {
                    tracing::warn!(ticker = %ticker.code, error = %e, "Search failed");
                }
            }
        }

        tracing::info!(feed = self.name(), count = all.len(), "Fetched search news");
        Ok(all)
    }
}

pub fn parse_search_page(html: &str, now: DateTime<Utc>) -> Vec<ContentItem> {
    let document = Html::parse_document(html);
    let Ok(items) = Selector::parse(ITEM_SEL) else {
        return Vec::new();
    };
    document
        .select(&items)
        .filter_map(|el| parse_search_item(el, now))
        .collect()
}

fn select_first<'a>(el: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    el.select(&sel).next()
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<String>())
}

fn parse_search_item(el: ElementRef<'_>, now: DateTime<Utc>) -> Option<ContentItem> {
    let link = select_first(el, TITLE_LINK_SEL)?;
    let title = text_of(select_first(link, TITLE_TEXT_SEL)?);
    if title.is_empty() {
        return None;
    }
    let url = link.value().attr("href").map(str::to_string);

    let body = select_first(el, SUMMARY_LINK_SEL)
        .and_then(|a| select_first(a, SUMMARY_TEXT_SEL))
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title.clone());
    let press = select_first(el, PRESS_SEL)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "네이버".to_string());
    let published_at = select_first(el, DATE_SEL)
        .and_then(|d| parse_search_date(&text_of(d), now))
        .unwrap_or(now);

    let mut item = ContentItem::new(title, body, published_at, format!("네이버({press})"));
    if let Some(url) = url {
        item = item.with_url(url);
    }
    Some(item)
}

fn relative_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*(초|분|시간|일|주)\s*전$").ok())
        .as_ref()
}

/// `N분 전` / `N시간 전` / `N일 전` relative to `now`, or an absolute portal date.
pub fn parse_search_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(caps) = relative_date_re().and_then(|re| re.captures(raw)) {
        let n: i64 = caps[1].parse().ok()?;
        let delta = match &caps[2] {
            "초" => Duration::seconds(n),
            "분" => Duration::minutes(n),
            "시간" => Duration::hours(n),
            "일" => Duration::days(n),
            _ => Duration::weeks(n),
        };
        return Some(now - delta);
    }
    parse_naver_datetime(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item_html(title: &str, summary: &str, press: &str, date: &str) -> String {
        format!(
            r##"<div class="vs1RfKE1eTzMZ5RqnhIv">
  <div class="sds-comps-profile-info-title-text"><a href="/press"><span>{press}</span></a></div>
  <div class="sds-comps-profile-info-subtext"><span class="U1zN1wdZWj0pyvj9oyR0"><span>{date}</span></span></div>
  <a class="VVZqvAlvnADQu8BVMc2n" href="https://news.example/{title}"><span class="sds-comps-text-type-headline1">{title}</span></a>
  <a class="IHHP42o8XWWWUySDAoa1" href="#"><span class="sds-comps-text-ellipsis-3">{summary}</span></a>
</div>"##
        )
    }

    #[test]
    fn test_parse_search_page() {
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 3, 0, 0).unwrap();
        let html = format!(
            "<html><body>{}{}<div class=\"vs1RfKE1eTzMZ5RqnhIv\"><p>광고</p></div></body></html>",
            item_html("삼성전자 실적 발표", "3분기 영업이익 증가", "연합뉴스", "3시간 전"),
            item_html("삼성전자 배당", "", "", "2025.10.30."),
        );
        let items = parse_search_page(&html, now);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "삼성전자 실적 발표");
        assert_eq!(items[0].body, "3분기 영업이익 증가");
        assert_eq!(items[0].source, "네이버(연합뉴스)");
        assert_eq!(items[0].published_at, now - Duration::hours(3));

        assert_eq!(items[1].body, "삼성전자 배당");
        assert_eq!(items[1].source, "네이버(네이버)");
        assert_eq!(items[1].published_at.to_rfc3339(), "2025-10-29T15:00:00+00:00");
    }

    #[test]
    fn test_relative_dates() {
        let now = Utc::now();
        assert_eq!(parse_search_date("15분 전", now), Some(now - Duration::minutes(15)));
        assert_eq!(parse_search_date("2일 전", now), Some(now - Duration::days(2)));
        assert_eq!(parse_search_date("몇 분 전", now), None);
    }
}
