mod common;

use chrono::{TimeZone, Utc};
use common::*;
use newspulse::application::ingest::SaveOutcome;
use newspulse::domain::error::DomainError;
use newspulse::domain::ports::market_data_repository::MarketTable;
use newspulse::domain::values::market_calendar::{market_status, MarketStatus};

#[test]
fn test_session_boundaries() {
    let at = |h, m| chrono::NaiveTime::from_hms_opt(h, m, 0).unwrap();
    assert_eq!(market_status(at(8, 0)), MarketStatus::Closed);
    assert_eq!(market_status(at(8, 45)), MarketStatus::PreMarket);
    assert_eq!(market_status(at(9, 0)), MarketStatus::Market);
    assert_eq!(market_status(at(15, 29)), MarketStatus::Market);
    assert_eq!(market_status(at(15, 30)), MarketStatus::PostMarket);
    assert_eq!(market_status(at(18, 0)), MarketStatus::Closed);
}

#[tokio::test]
async fn test_daily_bar_upsert_is_idempotent() {
    let app = setup();
    let repo = app.market_repo();
    let day = date(2025, 10, 31);

    repo.upsert_daily_bars(&[bar(SAMSUNG, day, 101.0, 99.0, 100.0)]).unwrap();
    repo.upsert_daily_bars(&[bar(SAMSUNG, day, 101.0, 99.0, 100.0)]).unwrap();
    repo.upsert_daily_bars(&[bar(SAMSUNG, day, 105.0, 99.0, 104.0)]).unwrap();

    assert_eq!(repo.count_rows(MarketTable::DailyBars).unwrap(), 1);
    assert_eq!(repo.daily_bar_on(SAMSUNG, day).unwrap().unwrap().close, 104.0);
}

#[tokio::test]
async fn test_backfill_daily_through_collector() {
    let app = Harness::new().with_market(FakeMarket::new(70_000.0)).build();
    seed_watchlist(&app);

    let report = app
        .backfill_daily(date(2025, 10, 27), date(2025, 10, 29))
        .await
        .unwrap();
    assert_eq!(report.targets, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(app.market_repo().count_rows(MarketTable::DailyBars).unwrap(), 6);

    app.backfill_daily(date(2025, 10, 27), date(2025, 10, 29))
        .await
        .unwrap();
    assert_eq!(app.market_repo().count_rows(MarketTable::DailyBars).unwrap(), 6);

    assert!(app
        .backfill_daily(date(2025, 10, 29), date(2025, 10, 27))
        .await
        .is_err());
}

#[tokio::test]
async fn test_collectors_need_credentials() {
    let app = setup();
    assert!(matches!(app.collector(), Err(DomainError::Config(_))));
    assert!(app
        .backfill_index(date(2025, 10, 1), date(2025, 10, 2))
        .await
        .is_err());
}

#[tokio::test]
async fn test_news_is_matched_with_business_day_closes() {
    let app = setup();
    let published = Utc.with_ymd_and_hms(2025, 11, 3, 1, 0, 0).unwrap();
    let item = match app
        .save_item(news_at("삼성전자 신고가 경신", "외국인 순매수", published))
        .await
    {
        SaveOutcome::Saved(item) => item,
        other => panic!("expected Saved, got {other:?}"),
    };
    app.market_repo()
        .upsert_daily_bars(&[
            bar(SAMSUNG, date(2025, 11, 3), 100.0, 100.0, 100.0),
            bar(SAMSUNG, date(2025, 11, 4), 110.0, 110.0, 110.0),
            bar(SAMSUNG, date(2025, 11, 5), 90.0, 90.0, 90.0),
        ])
        .unwrap();

    let now = Utc.with_ymd_and_hms(2025, 11, 6, 7, 0, 0).unwrap();
    let run = app.match_prices(now).unwrap();
    assert_eq!(run.matched, 1);

    let m = app.market_repo().price_match(item.id).unwrap().unwrap();
    assert!((m.changes.d1.unwrap() - 10.0).abs() < 1e-9);
    assert!((m.changes.d2.unwrap() + 10.0).abs() < 1e-9);
    assert_eq!(m.changes.d3, None);
    assert!(!m.changes.is_complete());
}

#[tokio::test]
async fn test_price_falls_back_to_latest_close() {
    let app = setup();
    assert!(app.current_price(HYNIX, Utc::now()).await.unwrap().is_none());

    seed_close(&app, HYNIX, 182_000.0);
    let quote = app.current_price(HYNIX, Utc::now()).await.unwrap().unwrap();
    assert_eq!(quote.price, 182_000.0);
}
