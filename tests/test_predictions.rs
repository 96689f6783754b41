//! Prediction invariants and A/B dispatch.

mod common;

use chrono::Utc;
use common::*;
use newspulse::application::ingest::SaveOutcome;
use newspulse::domain::entities::content_item::ContentItem;
use newspulse::domain::values::levels::UrgencyLevel;
use newspulse::domain::values::sentiment::{is_consistent, SentimentDirection};
use newspulse::NewsPulse;
use std::sync::Arc;

async fn save(app: &NewsPulse, title: &str) -> ContentItem {
    match app.save_item(news(title, "본문 내용")).await {
        SaveOutcome::Saved(item) => item,
        other => panic!("expected Saved, got {other:?}"),
    }
}

fn ab_app(b: FakeLlm) -> NewsPulse {
    let app = Harness::new().with_llm(b).build();
    seed_watchlist(&app);
    app.add_model("challenger", "openrouter", "anthropic/claude-3.5-sonnet", None)
        .unwrap();
    app.set_ab("gpt-4o-mini", "challenger").unwrap();
    app
}

#[tokio::test]
async fn test_inconsistent_model_output_is_normalised() {
    let raw = r#"{"sentiment_direction": "positive", "sentiment_score": -0.4,
                 "impact_level": "bogus", "relevance_score": 3, "urgency_level": "whenever"}"#;
    let app = Harness::new()
        .with_llm(FakeLlm::new("openai").with_prediction(raw))
        .build();
    seed_watchlist(&app);

    let item = save(&app, "삼성전자 노조 파업 예고").await;
    let p = &app.prediction_repo().list_for_item(item.id).unwrap()[0];

    assert_eq!(p.sentiment_direction, SentimentDirection::Negative);
    assert_eq!(p.sentiment_score, -0.4);
    assert!(is_consistent(p.sentiment_direction, p.sentiment_score));
    assert_eq!(p.relevance_score, 1.0);
    assert_eq!(p.urgency_level, UrgencyLevel::default());
}

#[tokio::test]
async fn test_unparseable_output_writes_no_row() {
    let app = Harness::new()
        .with_llm(FakeLlm::new("openai").with_prediction("죄송합니다, 분석할 수 없습니다."))
        .build();
    seed_watchlist(&app);

    let item = save(&app, "삼성전자 임시 주주총회 소집").await;
    assert!(app.prediction_repo().list_for_item(item.id).unwrap().is_empty());

    let outcome = app.predict_item(item.id).await.unwrap();
    assert!(outcome.predictions.is_empty());
    assert_eq!(outcome.failures.len(), 1);
}

#[tokio::test]
async fn test_ab_writes_one_row_per_model() {
    let app = ab_app(FakeLlm::new("openrouter"));
    let item = save(&app, "SK하이닉스 분기 최대 실적").await;

    let predictions = app.prediction_repo().list_for_item(item.id).unwrap();
    assert_eq!(predictions.len(), 2);
    assert_ne!(predictions[0].model_id, predictions[1].model_id);

    let again = app.predict_item(item.id).await.unwrap();
    assert_eq!(again.existing, 2);
    assert!(again.predictions.is_empty());
    assert_eq!(app.prediction_repo().list_for_item(item.id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_ab_failure_keeps_sibling_prediction() {
    let app = ab_app(FakeLlm::new("openrouter").failing());
    let item = save(&app, "SK하이닉스 美 공장 착공").await;

    let predictions = app.prediction_repo().list_for_item(item.id).unwrap();
    assert_eq!(predictions.len(), 1);
    let a = app.registry().lookup("gpt-4o-mini").unwrap();
    assert_eq!(predictions[0].model_id, a.id);

    let retry = app.predict_item(item.id).await.unwrap();
    assert_eq!(retry.existing, 1);
    assert_eq!(retry.failures.len(), 1);
    assert_eq!(retry.failures[0].0, "challenger");
}

#[tokio::test]
async fn test_reconcile_fills_in_the_missing_ab_arm() {
    let app = ab_app(FakeLlm::new("openrouter").failing_times(1));
    let item = save(&app, "SK하이닉스 HBM4 양산 돌입").await;
    assert_eq!(app.prediction_repo().list_for_item(item.id).unwrap().len(), 1);

    let (_, pending) = app.reconcile(Utc::now()).await.unwrap();
    assert_eq!(pending.candidates, 1);
    assert_eq!(pending.predicted, 1);
    assert_eq!(pending.failed, 0);

    let predictions = app.prediction_repo().list_for_item(item.id).unwrap();
    assert_eq!(predictions.len(), 2);
    let b = app.registry().lookup("challenger").unwrap();
    assert!(predictions.iter().any(|p| p.model_id == b.id));

    let (_, again) = app.reconcile(Utc::now()).await.unwrap();
    assert_eq!(again.candidates, 0);
}

#[tokio::test]
async fn test_reconcile_predicts_only_the_earlier_of_two_near_duplicates() {
    let mut harness = Harness::new().with_embedder(Arc::new(ConstantEmbedder));
    harness.settings.llm.auto_predict = false;
    let app = harness.build();
    seed_watchlist(&app);

    let first = save(&app, "SK하이닉스 청주 신규 팹 투자 발표").await;
    let second = save(&app, "SK하이닉스, 용인 클러스터 일정 앞당겨").await;
    assert!(app.prediction_repo().list_for_item(first.id).unwrap().is_empty());

    let (_, pending) = app.reconcile(Utc::now()).await.unwrap();
    assert_eq!(pending.candidates, 2);
    assert_eq!(pending.predicted, 1);
    assert_eq!(app.prediction_repo().list_for_item(first.id).unwrap().len(), 1);
    assert!(app.prediction_repo().list_for_item(second.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_clearing_ab_returns_to_default_model() {
    let app = ab_app(FakeLlm::new("openrouter"));
    app.clear_ab().unwrap();

    let item = save(&app, "삼성전자 갤럭시 신제품 공개").await;
    let predictions = app.prediction_repo().list_for_item(item.id).unwrap();
    assert_eq!(predictions.len(), 1);
    assert_eq!(
        predictions[0].model_id,
        app.registry().lookup("gpt-4o-mini").unwrap().id
    );
}

#[tokio::test]
async fn test_set_ab_rejects_unknown_or_identical_models() {
    let app = setup();
    assert!(app.set_ab("gpt-4o-mini", "nope").is_err());
    assert!(app.set_ab("gpt-4o-mini", "gpt-4o-mini").is_err());
}
