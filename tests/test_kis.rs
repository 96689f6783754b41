use newspulse::domain::error::DomainError;
use newspulse::domain::ports::cache::KeyValueCache;
use newspulse::domain::ports::market_data_source::MarketDataSource;
use newspulse::infrastructure::cache::memory::MemoryCache;
use newspulse::infrastructure::kis::client::KisClient;
use newspulse::infrastructure::kis::market_data::KisMarketData;
use newspulse::infrastructure::kis::token::{TokenManager, EXPIRES_KEY, TOKEN_KEY};
use newspulse::infrastructure::kis::{KisConfig, KisError};
use newspulse::infrastructure::retry::RetryPolicy;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";

fn config(server: &MockServer, app_key: &str) -> KisConfig {
    KisConfig::sandbox(app_key, "secret")
        .with_base_url(server.uri())
        .with_rate_limit(1000, Duration::from_secs(1))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/tokenP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tkn-1",
            "token_type": "Bearer",
            "expires_in": 86400
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn price_body() -> serde_json::Value {
    json!({
        "rt_cd": "0",
        "msg_cd": "MCA00000",
        "msg1": "정상처리 되었습니다.",
        "output": {"stck_prpr": "70,500", "prdy_vrss": "500", "prdy_vrss_sign": "2", "prdy_ctrt": "0.71", "acml_vol": "1234567"}
    })
}

#[tokio::test]
async fn test_concurrent_clients_share_one_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .and(header("authorization", "Bearer tkn-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(price_body()))
        .expect(10)
        .mount(&server)
        .await;

    let cache: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());
    let cfg = config(&server, "token-singleton");
    let calls = (0..10).map(|_| {
        let client = KisClient::new(cfg.clone(), cache.clone()).unwrap();
        async move { client.get(PRICE_PATH, "FHKST01010100", &[]).await }
    });
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_rate_limited_requests_are_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(price_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = KisClient::new(config(&server, "retry-429"), Arc::new(MemoryCache::new())).unwrap();
    let body = client.get(PRICE_PATH, "FHKST01010100", &[]).await.unwrap();
    assert_eq!(body["output"]["stck_prpr"], "70,500");
}

#[tokio::test]
async fn test_logical_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rt_cd": "1",
            "msg_cd": "EGW00123",
            "msg1": "기간이 만료된 token 입니다."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = KisClient::new(config(&server, "logical-error"), Arc::new(MemoryCache::new())).unwrap();
    let err = client.get(PRICE_PATH, "FHKST01010100", &[]).await.unwrap_err();
    assert!(matches!(err, KisError::Provider { ref code, .. } if code == "1"));
    assert!(matches!(DomainError::from(err), DomainError::Provider(_)));
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(PRICE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let client = KisClient::new(config(&server, "retry-budget"), Arc::new(MemoryCache::new())).unwrap();
    let err = client.get(PRICE_PATH, "FHKST01010100", &[]).await.unwrap_err();
    assert!(matches!(err, KisError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_daily_chart_is_parsed_in_date_order() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice"))
        .and(header("tr_id", "FHKST03010100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rt_cd": "0",
            "output2": [
                {"stck_bsop_date": "20251031", "stck_oprc": "70000", "stck_hgpr": "71000", "stck_lwpr": "69500", "stck_clpr": "70500", "acml_vol": "900"},
                {"stck_bsop_date": "20251030", "stck_oprc": "69000", "stck_hgpr": "70200", "stck_lwpr": "68800", "stck_clpr": "70000", "acml_vol": "800"},
                {"stck_bsop_date": "", "stck_oprc": "", "stck_hgpr": "", "stck_lwpr": "", "stck_clpr": ""}
            ]
        })))
        .mount(&server)
        .await;

    let client = KisClient::new(config(&server, "daily-chart"), Arc::new(MemoryCache::new())).unwrap();
    let source = KisMarketData::new(client);
    let from = chrono::NaiveDate::from_ymd_opt(2025, 10, 30).unwrap();
    let to = chrono::NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
    let bars = source.daily_chart("005930", from, to).await.unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].date, from);
    assert_eq!(bars[1].close, 70500.0);
    assert_eq!(bars[1].volume, 900);
}

#[tokio::test]
async fn test_failed_token_refresh_clears_cache_and_surfaces_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/tokenP"))
        .respond_with(ResponseTemplate::new(500).set_body_string("token service down"))
        .expect(2)
        .mount(&server)
        .await;

    let cache: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());
    // A token about to expire forces a refresh.
    let soon = chrono::Utc::now().timestamp() + 60;
    cache.set(TOKEN_KEY, "stale", None).await.unwrap();
    cache.set(EXPIRES_KEY, &soon.to_string(), None).await.unwrap();

    let manager = TokenManager::new(&config(&server, "token-failure"), cache.clone());
    let err = manager.access_token().await.unwrap_err();
    assert!(matches!(err, KisError::Token(_)));
    assert!(cache.get(TOKEN_KEY).await.unwrap().is_none());
    assert!(cache.get(EXPIRES_KEY).await.unwrap().is_none());

    assert!(manager.access_token().await.is_err());
}

#[tokio::test]
async fn test_shared_manager_is_scoped_to_its_cache() {
    let server = MockServer::start().await;
    let cfg = config(&server, "token-scope");
    let first: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());
    let second: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());

    let a = TokenManager::shared(&cfg, first.clone());
    let b = TokenManager::shared(&cfg, first);
    let c = TokenManager::shared(&cfg, second);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}
