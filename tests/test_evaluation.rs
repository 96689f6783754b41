//! Scoring reports against realised OHLC.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::*;
use newspulse::domain::entities::report::AnalysisSummary;
use newspulse::NewsPulse;

/// 16:00 KST on the given day.
fn kst_afternoon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 7, 0, 0).unwrap()
}

fn insert_report(app: &NewsPulse, base: f64, target: f64, support: f64, at: DateTime<Utc>) -> i64 {
    let model = app.registry().lookup("gpt-4o-mini").unwrap();
    app.report_repo()
        .insert(&AnalysisSummary {
            ticker_code: SAMSUNG.to_string(),
            overall_summary: "테스트".into(),
            base_price: Some(base),
            short_term_target_price: Some(target),
            short_term_support_price: Some(support),
            custom_data: Some(serde_json::json!({
                "ab_test_enabled": false,
                "model_id": model.id,
                "model_name": model.name,
            })),
            last_updated: at,
            ..Default::default()
        })
        .unwrap()
}

#[tokio::test]
async fn test_five_day_window_scores() {
    let app = setup();
    let report_id = insert_report(&app, 100.0, 110.0, 95.0, kst_afternoon(2025, 11, 3));
    let highs = [102.0, 108.0, 111.0, 109.0, 107.0];
    let lows = [99.0, 97.0, 100.0, 98.0, 96.0];
    let bars: Vec<_> = (0..5)
        .map(|i| bar(SAMSUNG, date(2025, 11, 4 + i), highs[i as usize], lows[i as usize], 100.0))
        .collect();
    app.market_repo().upsert_daily_bars(&bars).unwrap();

    let run = app.evaluate(kst_afternoon(2025, 11, 12)).unwrap();
    assert_eq!(run.evaluated, 1);

    let evals = app.evaluations_for_report(report_id).unwrap();
    assert_eq!(evals.len(), 1);
    let e = &evals[0];
    assert!(e.target_achieved);
    assert_eq!(e.target_achieved_days, Some(3));
    assert!(!e.support_breached);
    assert_eq!(e.target_accuracy_score, 100.0);
    assert!((e.timing_score - 60.0).abs() < 1e-9);
    assert_eq!(e.risk_management_score, 100.0);
    assert!((e.final_score - 88.0).abs() < 1e-9);
    assert_eq!(e.actual_high_5d, Some(111.0));
    assert_eq!(e.actual_low_5d, Some(96.0));
    assert_eq!(e.actual_high_1d, Some(102.0));
}

#[tokio::test]
async fn test_next_day_breakout() {
    let app = setup();
    let report_id = insert_report(&app, 50_000.0, 52_000.0, 49_000.0, kst_afternoon(2025, 11, 1));
    app.market_repo()
        .upsert_daily_bars(&[bar(SAMSUNG, date(2025, 11, 2), 52_500.0, 49_500.0, 52_000.0)])
        .unwrap();

    let run = app.evaluate(kst_afternoon(2025, 11, 3)).unwrap();
    assert_eq!(run.evaluated, 1);

    let e = &app.evaluations_for_report(report_id).unwrap()[0];
    assert!(e.target_achieved);
    assert_eq!(e.target_achieved_days, Some(1));
    assert!(!e.support_breached);

    // Evaluations are final.
    let rerun = app.evaluate(kst_afternoon(2025, 11, 10)).unwrap();
    assert_eq!(rerun.evaluated, 0);
    assert_eq!(rerun.already_evaluated, 1);
}

#[tokio::test]
async fn test_report_waits_for_prices_and_age() {
    let app = setup();
    insert_report(&app, 100.0, 110.0, 95.0, kst_afternoon(2025, 11, 3));

    let too_early = app.evaluate(kst_afternoon(2025, 11, 3)).unwrap();
    assert_eq!(too_early.reports, 0);

    let no_bars = app.evaluate(kst_afternoon(2025, 11, 5)).unwrap();
    assert_eq!(no_bars.reports, 1);
    assert_eq!(no_bars.awaiting_prices, 1);
    assert_eq!(no_bars.evaluated, 0);
}

#[tokio::test]
async fn test_human_rating_blends_final_score() {
    let app = setup();
    let report_id = insert_report(&app, 50_000.0, 52_000.0, 49_000.0, kst_afternoon(2025, 11, 1));
    app.market_repo()
        .upsert_daily_bars(&[bar(SAMSUNG, date(2025, 11, 3), 51_000.0, 48_000.0, 50_000.0)])
        .unwrap();
    app.evaluate(kst_afternoon(2025, 11, 4)).unwrap();
    let e = app.evaluations_for_report(report_id).unwrap().remove(0);
    assert!(!e.target_achieved);
    assert!(e.support_breached);

    let rated = app.rate(e.id, 5, 4, 3).unwrap();
    assert_eq!(rated.human_ratings(), Some((5, 4, 3)));
    let expected = 0.5 * e.final_score + 0.5 * 80.0;
    assert!((rated.final_score - expected).abs() < 1e-9);

    assert!(app.rate(e.id, 6, 4, 3).is_err());

    let rows = app.aggregate_daily(date(2025, 11, 1)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].evaluated_count, 1);
    assert_eq!(rows[0].human_evaluated_count, 1);
    assert_eq!(rows[0].support_breach_rate, 1.0);
    assert_eq!(app.daily_performance(date(2025, 11, 1)).unwrap().len(), 1);
}
