mod common;

use common::*;
use newspulse::domain::error::DomainError;

#[tokio::test]
async fn test_report_summarises_recent_predictions() {
    let app = setup();
    seed_close(&app, SAMSUNG, 71_000.0);
    app.save_item(news("삼성전자 HBM 퀄테스트 통과", "엔비디아 공급 가시화"))
        .await;
    app.save_item(news("삼성전자 파운드리 2나노 수주", "대형 고객사 확보"))
        .await;

    let report = app.generate_report(SAMSUNG).await.unwrap();

    assert!(report.id > 0);
    assert_eq!(report.ticker_code, SAMSUNG);
    assert_eq!(report.total_predictions, 2);
    assert_eq!(report.up_count, 2);
    assert_eq!(report.down_count + report.hold_count, 0);
    assert_eq!(report.avg_confidence, Some(0.9));
    // The price service answer wins over the model's own base price.
    assert_eq!(report.base_price, Some(71_000.0));
    assert_eq!(report.short_term_target_price, Some(74_000.0));
    assert_eq!(report.short_term_support_price, Some(68_000.0));
    assert_eq!(report.recommendation.as_deref(), Some("매수"));
    assert!(!report.is_ab_test());

    let custom = report.custom_data.clone().unwrap();
    assert_eq!(
        custom["model_id"].as_i64(),
        Some(app.registry().lookup("gpt-4o-mini").unwrap().id)
    );

    let latest = app.latest_report(SAMSUNG).unwrap().unwrap();
    assert_eq!(latest.id, report.id);
}

#[tokio::test]
async fn test_ab_report_stores_both_arms() {
    let app = Harness::new()
        .with_llm(FakeLlm::new("openrouter").with_report(
            r#"{"overall_summary": "보수적 관점", "recommendation": "보유",
                "price_targets": {"base_price": 70000, "short_term_target": 72000, "short_term_support": 66000}}"#,
        ))
        .build();
    seed_watchlist(&app);
    app.add_model("challenger", "openrouter", "anthropic/claude-3.5-sonnet", None)
        .unwrap();
    app.set_ab("gpt-4o-mini", "challenger").unwrap();

    let report = app.generate_report(HYNIX).await.unwrap();

    assert!(report.is_ab_test());
    assert_eq!(report.overall_summary, "실적 개선 흐름");
    assert_eq!(report.short_term_target_price, Some(74_000.0));

    let a = report.arm_levels("model_a").unwrap();
    let b = report.arm_levels("model_b").unwrap();
    assert_eq!(a.target, 74_000.0);
    assert_eq!(b.target, 72_000.0);
    assert_eq!(b.support, 66_000.0);
    assert_eq!(
        report.arm_model_id("model_b"),
        Some(app.registry().lookup("challenger").unwrap().id)
    );
}

#[tokio::test]
async fn test_ab_report_counts_each_item_once() {
    let app = Harness::new()
        .with_llm(FakeLlm::new("openrouter").with_prediction(
            r#"{"sentiment_direction": "negative", "sentiment_score": -0.5, "impact_level": "medium",
                "relevance_score": 0.5, "urgency_level": "short_term"}"#,
        ))
        .build();
    seed_watchlist(&app);
    app.add_model("challenger", "openrouter", "anthropic/claude-3.5-sonnet", None)
        .unwrap();
    app.set_ab("gpt-4o-mini", "challenger").unwrap();

    app.save_item(news("삼성전자 HBM 퀄테스트 통과", "엔비디아 공급 가시화"))
        .await;
    app.save_item(news("삼성전자 파운드리 2나노 수주", "대형 고객사 확보"))
        .await;
    let stored = app
        .prediction_repo()
        .list_for_ticker(SAMSUNG, chrono::Utc::now() - chrono::Duration::days(1))
        .unwrap();
    assert_eq!(stored.len(), 4);

    let report = app.generate_report(SAMSUNG).await.unwrap();

    assert_eq!(report.total_predictions, 2);
    assert_eq!(report.up_count, 2);
    assert_eq!(report.down_count, 0);
    assert_eq!(report.avg_confidence, Some(0.9));
}

#[tokio::test]
async fn test_report_for_unknown_ticker_fails() {
    let app = setup();
    assert!(matches!(
        app.generate_report("999999").await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_priority_batch_covers_core_tickers() {
    let app = setup();
    let batch = app.generate_reports(2).await.unwrap();
    assert_eq!(batch.generated.len(), 2);
    assert!(batch.failed.is_empty());
    assert_eq!(app.report_history(HYNIX, 10).unwrap().len(), 1);
}
