mod common;

use chrono::Utc;
use common::*;
use newspulse::domain::entities::ticker::Ticker;
use newspulse::domain::ports::content_repository::ContentFilter;
use newspulse::domain::ports::ticker_repository::TickerRepository;
use newspulse::domain::values::content_type::ContentType;
use newspulse::domain::values::market_calendar::kst_now;
use newspulse::domain::values::priority::Priority;
use newspulse::infrastructure::feeds::base::HttpFetcher;
use newspulse::infrastructure::feeds::dart::DartFeed;
use newspulse::infrastructure::feeds::reddit::{RedditConfig, RedditFeed};
use newspulse::infrastructure::feeds::Feed;
use newspulse::infrastructure::sqlite::open_connection;
use newspulse::infrastructure::sqlite::ticker_repo::SqliteTickerRepo;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_http() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5), Duration::ZERO).unwrap()
}

fn core_tickers() -> Arc<SqliteTickerRepo> {
    let repo = SqliteTickerRepo::new(open_connection(":memory:").unwrap());
    repo.upsert(&Ticker::new(SAMSUNG, "삼성전자", Priority::new(1).unwrap()).unwrap())
        .unwrap();
    repo.upsert(&Ticker::new(HYNIX, "SK하이닉스", Priority::new(2).unwrap()).unwrap())
        .unwrap();
    repo.upsert(&Ticker::new("035420", "NAVER", Priority::new(4).unwrap()).unwrap())
        .unwrap();
    Arc::new(repo)
}

#[tokio::test]
async fn test_dart_disclosures_are_ingested_as_disclosures() {
    let server = MockServer::start().await;
    let today = kst_now().date_naive().format("%Y%m%d").to_string();
    Mock::given(method("GET"))
        .and(path("/list.json"))
        .and(query_param("corp_code", SAMSUNG))
        .and(query_param("crtfc_key", "dart-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "000",
            "message": "정상",
            "list": [{
                "corp_name": "삼성전자",
                "report_nm": "주요사항보고서(자기주식취득결정)",
                "rcept_no": "20251031000123",
                "flr_nm": "삼성전자",
                "rcept_dt": today
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list.json"))
        .and(query_param("corp_code", HYNIX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "013",
            "message": "조회된 데이타가 없습니다."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = DartFeed::new(Some("dart-key".into()), core_tickers())
        .unwrap()
        .with_base_url(&server.uri())
        .with_http(fast_http());
    let items = feed.fetch_recent(100).await.unwrap();
    assert_eq!(items.len(), 1);

    let app = setup();
    let result = app.ingest_items(feed.name(), items).await;
    assert_eq!(result.entries_added, 1);

    let stored = app
        .content_repo()
        .query(&ContentFilter {
            content_type: Some(ContentType::Disclosure),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "[공시] 주요사항보고서(자기주식취득결정)");
    assert_eq!(stored[0].ticker.as_deref(), Some(SAMSUNG));
}

#[tokio::test]
async fn test_dart_without_key_fetches_nothing() {
    let feed = DartFeed::new(Some("  ".into()), core_tickers()).unwrap();
    assert!(feed.fetch_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reddit_keeps_engaged_recent_keyword_posts() {
    let server = MockServer::start().await;
    let fresh = (Utc::now().timestamp() - 600) as f64;
    let stale = (Utc::now().timestamp() - 3 * 86_400) as f64;
    let post = |id: &str, title: &str, score: i64, comments: i64, created: f64| {
        json!({"data": {
            "id": id, "title": title, "selftext": "", "score": score,
            "num_comments": comments, "created_utc": created,
            "permalink": format!("/r/korea/comments/{id}/"), "author": "poster", "subreddit": "korea"
        }})
    };

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "reddit-token", "token_type": "bearer", "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/korea/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"children": [
            post("a1", "Samsung beats memory estimates", 120, 40, fresh),
            post("a2", "Samsung rumor", 10, 40, fresh),
            post("a3", "Seoul weather this week", 300, 80, fresh),
            post("a4", "KOSPI closes higher", 90, 12, stale),
        ]}})))
        .expect(1)
        .mount(&server)
        .await;

    let feed = RedditFeed::new(RedditConfig {
        client_id: "id".into(),
        client_secret: "secret".into(),
        subreddits: vec!["korea".into()],
        ..Default::default()
    })
    .unwrap()
    .with_urls(&server.uri(), &server.uri())
    .with_http(fast_http());

    let items = feed.fetch_recent(25).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Samsung beats memory estimates");
    assert_eq!(items[0].content_type, ContentType::SocialPost);
    assert_eq!(items[0].social.as_ref().unwrap().upvotes, 120);

    let app = setup();
    let result = app.ingest_items(feed.name(), items).await;
    assert_eq!(result.entries_added, 1);
}

#[tokio::test]
async fn test_reddit_requires_credentials() {
    assert!(RedditFeed::new(RedditConfig::default()).is_err());
}

#[tokio::test]
async fn test_unknown_feed_is_not_found() {
    let app = setup();
    assert!(app.ingest_feed("bloomberg").await.is_err());
}
