use super::base::{HttpFetcher, DEFAULT_RATE_GAP, DEFAULT_TIMEOUT};
use super::{Feed, FeedError};
use crate::domain::entities::content_item::ContentItem;
use crate::domain::values::market_calendar::kst;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use scraper::{CaseSensitivity, ElementRef, Html, Selector};

pub const NAVER_FINANCE_URL: &str = "https://finance.naver.com";
const LIST_PATH: &str = "/news/news_list.naver?mode=LSS2D&section_id=101&section_id2=258";
const MAX_PAGES: u32 = 5;

/// Naver Finance stock news list (증권 > 종목 뉴스).
pub struct NaverNewsFeed {
    http: HttpFetcher,
    base_url: String,
}

impl NaverNewsFeed {
    pub fn new() -> Result<Self, FeedError> {
        Ok(Self {
            http: HttpFetcher::new(DEFAULT_TIMEOUT, DEFAULT_RATE_GAP)?,
            base_url: NAVER_FINANCE_URL.to_string(),
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

    fn page_url(&self, page: u32) -> String {
        format!("{}{LIST_PATH}&page={page}", self.base_url)
    }
}

#[async_trait]
impl Feed for NaverNewsFeed {
    fn name(&self) -> &str {
        "naver_news"
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<ContentItem>, FeedError> {
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            if items.len() >= limit {
                break;
            }
            let html = match self.http.get_text(&self.page_url(page)).await {
                Ok(html) => html,
                // A failed first page is a failed run; later pages just end the walk.
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(page, error = %e, "Naver list page failed");
                    break;
                }
            };

            let parsed = parse_list_page(&html, &self.base_url, Utc::now());
            if parsed.is_empty() {
                tracing::info!(page, "No more news on page");
                break;
            }
            items.extend(parsed);
        }

        items.truncate(limit);
        tracing::info!(feed = self.name(), count = items.len(), "Fetched portal news");
        Ok(items)
    }
}

/// Parses one news-list page. Items missing a title link are skipped.
pub fn parse_list_page(html: &str, base_url: &str, now: DateTime<Utc>) -> Vec<ContentItem> {
    let document = Html::parse_document(html);
    let Ok(subjects) = Selector::parse("dl > dd.articleSubject, dl > dt.articleSubject") else {
        return Vec::new();
    };
    document
        .select(&subjects)
        .filter_map(|subject| parse_item(subject, base_url, now))
        .collect()
}

fn parse_item(subject: ElementRef<'_>, base_url: &str, now: DateTime<Utc>) -> Option<ContentItem> {
    let link_sel = Selector::parse("a").ok()?;
    let link = subject.select(&link_sel).next()?;
    let title = collapse(&link.text().collect::<String>());
    if title.is_empty() {
        return None;
    }
    let url = link.value().attr("href").map(|href| absolute_url(href, base_url));

    let summary = subject
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| {
            e.value().name() == "dd"
                && e.value().has_class("articleSummary", CaseSensitivity::CaseSensitive)
        });

    let (body, published_at, press) = match summary {
        Some(summary) => {
            let body: String = summary
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let published_at = first_text(summary, ".wdate")
                .and_then(|s| parse_naver_datetime(&s))
                .unwrap_or(now);
            let press = first_text(summary, ".press").unwrap_or_else(|| "네이버".to_string());
            (body, published_at, press)
        }
        None => (String::new(), now, "네이버".to_string()),
    };

    let body = if body.is_empty() { title.clone() } else { body };
    let mut item = ContentItem::new(title, body, published_at, format!("네이버({press})"));
    if let Some(url) = url {
        item = item.with_url(url);
    }
    Some(item)
}

fn first_text(el: ElementRef<'_>, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = collapse(&el.select(&sel).next()?.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

pub(crate) fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn absolute_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}

/// Accepts the portal's date shapes, interpreted as KST wall-clock time.
pub fn parse_naver_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().trim_end_matches('.');
    let naive = ["%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            ["%Y.%m.%d", "%Y-%m-%d"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    kst()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body><div class="mainNewsList">
<ul class="realtimeNewsList">
  <li class="newsList top">
    <dl>
      <dt class="thumb"><a href="/news/news_read.naver?article_id=1"><img src="x.jpg"></a></dt>
      <dd class="articleSubject"><a href="/news/news_read.naver?article_id=1">삼성전자, HBM 공급 확대</a></dd>
      <dd class="articleSummary">
        삼성전자가 엔비디아향 HBM 공급을 늘린다.
        <span class="press">한국경제</span><span class="bar">|</span>
        <span class="wdate">2025-10-31 20:23</span>
      </dd>
      <dt class="articleSubject"><a href="https://n.news.naver.com/2">SK하이닉스 목표가 상향</a></dt>
      <dd class="articleSummary">
        <span class="press">매일경제</span><span class="wdate">2025.10.31 14:30</span>
      </dd>
      <dd class="articleSubject"><span>링크 없음</span></dd>
    </dl>
  </li>
</ul></div></body></html>"#;

    #[test]
    fn test_parse_list_page() {
        let now = Utc::now();
        let items = parse_list_page(PAGE, NAVER_FINANCE_URL, now);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "삼성전자, HBM 공급 확대");
        assert_eq!(items[0].body, "삼성전자가 엔비디아향 HBM 공급을 늘린다.");
        assert_eq!(items[0].source, "네이버(한국경제)");
        assert_eq!(
            items[0].url.as_deref(),
            Some("https://finance.naver.com/news/news_read.naver?article_id=1")
        );
        assert_eq!(items[0].published_at.to_rfc3339(), "2025-10-31T11:23:00+00:00");

        // No summary text: the title stands in for the body.
        assert_eq!(items[1].body, "SK하이닉스 목표가 상향");
        assert_eq!(items[1].source, "네이버(매일경제)");
        assert_eq!(items[1].published_at.to_rfc3339(), "2025-10-31T05:30:00+00:00");
    }

    #[test]
    fn test_parse_naver_datetime_formats() {
        assert!(parse_naver_datetime("2025-10-31 20:23").is_some());
        assert!(parse_naver_datetime("2025.10.31 14:30").is_some());
        assert!(parse_naver_datetime("2025.10.31.").is_some());
        assert!(parse_naver_datetime("2025-10-31").is_some());
        assert!(parse_naver_datetime("어제").is_none());
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        assert!(parse_list_page("<html></html>", NAVER_FINANCE_URL, Utc::now()).is_empty());
    }
}
