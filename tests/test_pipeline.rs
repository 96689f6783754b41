//! Ingestion through prediction: mapping, dedup, embedding, auto-predict.

mod common;

use chrono::Utc;
use common::*;
use newspulse::application::ingest::SaveOutcome;
use std::sync::Arc;

fn saved(outcome: SaveOutcome) -> newspulse::domain::entities::content_item::ContentItem {
    match outcome {
        SaveOutcome::Saved(item) => item,
        other => panic!("expected Saved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_news_is_mapped_embedded_and_predicted_once() {
    let app = setup();
    seed_close(&app, SAMSUNG, 70_000.0);

    let item = saved(
        app.save_item(news(
            "삼성전자, 3분기 영업이익 10조 돌파",
            "메모리 반도체 가격 반등으로 3분기 실적이 시장 예상을 웃돌았다.",
        ))
        .await,
    );

    assert_eq!(item.ticker.as_deref(), Some(SAMSUNG));
    assert_eq!(app.vector_store().count().unwrap(), 1);

    let predictions = app.prediction_repo().list_for_item(item.id).unwrap();
    assert_eq!(predictions.len(), 1);
    let p = &predictions[0];
    assert_eq!(p.ticker_code, SAMSUNG);
    assert_eq!(p.target_horizon, "1d");

    let quote = app.current_price(SAMSUNG, Utc::now()).await.unwrap().unwrap();
    assert_eq!(p.base_price, Some(quote.price));
    assert_eq!(quote.price, 70_000.0);
}

#[tokio::test]
async fn test_repeat_title_is_deduplicated() {
    let app = setup();
    let first = app
        .save_item(news("SK하이닉스, HBM4 양산 돌입", "본문"))
        .await;
    assert!(matches!(first, SaveOutcome::Saved(_)));

    let again = app
        .save_item(news("SK하이닉스, HBM4 양산 돌입", "다른 매체 본문"))
        .await;
    assert!(matches!(again, SaveOutcome::Duplicate));

    let punctuated = app
        .save_item(news("[속보] SK하이닉스, HBM4 양산 돌입!", "본문"))
        .await;
    assert!(matches!(punctuated, SaveOutcome::Duplicate));

    let different = app
        .save_item(news("코스피, 외국인 매수에 2600선 회복", "본문"))
        .await;
    assert!(matches!(different, SaveOutcome::Saved(_)));
}

#[tokio::test]
async fn test_item_without_ticker_is_stored_but_not_predicted() {
    let app = setup();
    let item = saved(app.save_item(news("한국은행 기준금리 동결", "물가 안정 기조 유지")).await);

    assert!(item.ticker.is_none());
    assert_eq!(app.vector_store().count().unwrap(), 0);
    assert!(app.prediction_repo().list_for_item(item.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_mojibake_title_is_repaired_and_garbage_dropped() {
    let app = setup();
    let original = "삼성전자 주가 급등";
    let garbled: String = original.as_bytes().iter().map(|b| *b as char).collect();

    let item = saved(app.save_item(news(&garbled, "")).await);
    assert_eq!(item.title, original);
    assert_eq!(item.ticker.as_deref(), Some(SAMSUNG));

    let dropped = app.save_item(news("\u{FFFD}\u{FFFD}\u{FFFD}", "본문")).await;
    assert!(matches!(dropped, SaveOutcome::Unsalvageable));
}

#[tokio::test]
async fn test_near_identical_embedding_skips_prediction() {
    let app = Harness::new().with_embedder(Arc::new(ConstantEmbedder)).build();
    seed_watchlist(&app);

    let first = saved(app.save_item(news("삼성전자 신규 파운드리 고객 확보", "본문")).await);
    let second = saved(
        app.save_item(news("삼성전자, 북미 빅테크와 대형 공급계약", "본문"))
            .await,
    );

    assert_eq!(app.prediction_repo().list_for_item(first.id).unwrap().len(), 1);
    assert!(app.prediction_repo().list_for_item(second.id).unwrap().is_empty());

    let outcome = app.predict_item(second.id).await.unwrap();
    assert_eq!(outcome.skipped_for, Some(first.id));
    assert!(outcome.predictions.is_empty());
}

#[tokio::test]
async fn test_ingest_items_reports_counts() {
    let app = setup();
    let result = app
        .ingest_items(
            "manual",
            vec![
                news("삼성전자 자사주 매입 결정", "본문"),
                news("삼성전자 자사주 매입 결정", "본문"),
                news("\u{FFFD}\u{FFFD}", "본문"),
            ],
        )
        .await;

    assert_eq!(result.entries_fetched, 3);
    assert_eq!(result.entries_added, 1);
    assert_eq!(result.entries_deduped, 1);
    assert_eq!(result.entries_dropped, 1);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_reconcile_fills_missing_predictions() {
    let harness = Harness::new().with_llm(FakeLlm::new("openai").failing());
    let app = harness.build();
    seed_watchlist(&app);

    let item = saved(app.save_item(news("SK하이닉스 목표주가 상향", "증권가 일제히 상향")).await);
    assert!(app.prediction_repo().list_for_item(item.id).unwrap().is_empty());
    assert_eq!(app.vector_store().count().unwrap(), 1);

    let (embedded, predicted) = app.reconcile(Utc::now()).await.unwrap();
    assert_eq!(embedded.candidates, 0);
    assert_eq!(predicted.candidates, 1);
    assert_eq!(predicted.predicted, 0);
}

#[tokio::test]
async fn test_encoding_cleanup_repairs_and_deletes_stored_items() {
    let app = setup();
    let repo = app.content_repo();
    let since = Utc::now() - chrono::Duration::hours(24);
    let garbled: String = "SK하이닉스 HBM 증설".as_bytes().iter().map(|b| *b as char).collect();
    for title in [garbled.as_str(), "\u{FFFD}\u{FFFD}\u{FFFD}", "삼성전자 배당 확대"] {
        repo.insert_if_novel(&news(title, ""), since, &|_, _| false).unwrap();
    }

    let dry = app.cleanup_encoding(true).unwrap();
    assert_eq!((dry.scanned, dry.repaired, dry.deleted), (3, 1, 1));
    assert_eq!(repo.all_ids().unwrap().len(), 3);

    let real = app.cleanup_encoding(false).unwrap();
    assert_eq!((real.scanned, real.repaired, real.deleted), (3, 1, 1));
    let ids = repo.all_ids().unwrap();
    assert_eq!(ids.len(), 2);
    let titles: Vec<String> = ids
        .iter()
        .map(|id| repo.get_by_id(*id).unwrap().unwrap().title)
        .collect();
    assert!(titles.contains(&"SK하이닉스 HBM 증설".to_string()));

    let again = app.cleanup_encoding(false).unwrap();
    assert_eq!((again.scanned, again.repaired, again.deleted), (2, 0, 0));
}
