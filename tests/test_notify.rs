mod common;

use chrono::Utc;
use common::*;
use newspulse::application::ingest::SaveOutcome;
use std::sync::Arc;

#[tokio::test]
async fn test_predicted_item_is_notified_once() {
    let harness = Harness::new();
    let app = harness.build();
    seed_watchlist(&app);
    let SaveOutcome::Saved(item) = app.save_item(news("삼성전자 HBM 공급 계약", "엔비디아향 공급 확대")).await else {
        panic!("item should be saved");
    };

    let first = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(first.candidates, 1);
    assert_eq!(first.sent, 1);
    assert_eq!(harness.notifier.sent_ids(), vec![item.id]);
    assert!(app.content_repo().get_by_id(item.id).unwrap().unwrap().notified_at.is_some());

    let second = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(second.candidates, 0);
    assert_eq!(harness.notifier.sent_ids().len(), 1);
}

#[tokio::test]
async fn test_items_without_ticker_are_not_notified() {
    let harness = Harness::new();
    let app = harness.build();
    seed_watchlist(&app);
    app.save_item(news("코스피 마감 시황", "외국인 매도세 지속")).await;

    let run = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(run.candidates, 0);
    assert!(harness.notifier.sent_ids().is_empty());
}

#[tokio::test]
async fn test_near_duplicate_of_notified_item_is_suppressed() {
    let harness = Harness::new().with_embedder(Arc::new(ConstantEmbedder));
    let app = harness.build();
    seed_watchlist(&app);

    app.save_item(news("삼성전자 3분기 영업이익 발표", "시장 예상치 상회")).await;
    assert_eq!(app.notify_recent(Utc::now()).await.unwrap().sent, 1);

    app.save_item(news("삼성전자 잠정실적 공개", "증권가 전망 웃돌아")).await;
    let run = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(run.candidates, 1);
    assert_eq!(run.suppressed, 1);
    assert_eq!(run.sent, 0);
    assert_eq!(harness.notifier.sent_ids().len(), 1);
}

#[tokio::test]
async fn test_unpredicted_item_is_held_until_predicted() {
    let mut harness = Harness::new();
    harness.settings.llm.auto_predict = false;
    let app = harness.build();
    seed_watchlist(&app);
    let SaveOutcome::Saved(item) = app.save_item(news("SK하이닉스 자사주 소각 결정", "주주환원 강화")).await else {
        panic!("item should be saved");
    };

    let held = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(held.candidates, 1);
    assert_eq!(held.held, 1);
    assert_eq!(held.sent, 0);
    assert!(harness.notifier.sent_ids().is_empty());
    assert!(app.content_repo().get_by_id(item.id).unwrap().unwrap().notified_at.is_none());

    app.predict_item(item.id).await.unwrap();
    let sent = app.notify_recent(Utc::now()).await.unwrap();
    assert_eq!(sent.sent, 1);
    assert_eq!(harness.notifier.sent_ids(), vec![item.id]);
}
