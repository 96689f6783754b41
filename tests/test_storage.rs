mod common;

use common::*;

#[tokio::test]
async fn test_on_disk_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::new();
    harness.settings.database.path = dir.path().join("newspulse.db").to_string_lossy().into_owned();

    {
        let app = harness.build();
        seed_watchlist(&app);
        app.save_item(news("삼성전자 자사주 매입", "10조원 규모")).await;
        app.market_repo()
            .upsert_daily_bars(&[bar(SAMSUNG, date(2025, 10, 31), 71000.0, 69000.0, 70500.0)])
            .unwrap();
    }

    let app = harness.build();
    assert_eq!(app.watchlist().unwrap().len(), 2);
    let stats = app.stats().unwrap();
    assert_eq!(stats.content.total_items, 1);
    assert_eq!(stats.content.with_ticker, 1);
    assert_eq!(stats.embeddings, 1);
    assert!(app
        .market_repo()
        .daily_bar_on(SAMSUNG, date(2025, 10, 31))
        .unwrap()
        .is_some());

    // A second save of the same story is still caught after the restart.
    let again = app.save_item(news("삼성전자 자사주 매입", "10조원 규모")).await;
    assert!(matches!(again, newspulse::application::ingest::SaveOutcome::Duplicate));
}
