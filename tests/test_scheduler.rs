mod common;

use common::*;
use newspulse::domain::error::DomainError;
use newspulse::infrastructure::scheduler::JobRunner;
use newspulse::jobs;
use std::sync::Arc;

fn ids(runner: &JobRunner) -> Vec<String> {
    runner.jobs().iter().map(|j| j.id.clone()).collect()
}

#[tokio::test]
async fn test_catalogue_without_market_data() {
    let app = Arc::new(setup());
    let runner = JobRunner::new(jobs::catalogue(&app));
    let ids = ids(&runner);

    assert_eq!(
        ids,
        vec!["auto_notify", "embedding_reconcile", "price_match", "reports", "evaluation", "daily_aggregation"]
    );
    let reports = runner.jobs().iter().find(|j| j.id == "reports").unwrap();
    let times: Vec<String> = reports.triggers.iter().map(|t| t.to_string()).collect();
    assert_eq!(times, vec!["09:15 KST", "13:00 KST", "15:40 KST"]);
}

#[tokio::test]
async fn test_catalogue_adds_collectors_with_market_source() {
    let app = Arc::new(Harness::new().with_market(FakeMarket::new(70_000.0)).build());
    let runner = JobRunner::new(jobs::catalogue(&app));
    let ids = ids(&runner);

    assert_eq!(ids.len(), 15);
    for id in ["collect_minute", "collect_daily", "collect_overtime", "collect_stock_info"] {
        assert!(ids.iter().any(|j| j == id), "missing {id}");
    }
}

#[tokio::test]
async fn test_run_now_records_stats() {
    let app = Arc::new(setup());
    let runner = JobRunner::new(jobs::catalogue(&app));

    let summary = runner.run_now("price_match").await.unwrap();
    assert!(summary.starts_with("candidates=0"));

    let stats = runner.stats().get("price_match").unwrap();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.last_summary.as_deref(), Some(summary.as_str()));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = Arc::new(setup());
    let runner = JobRunner::new(jobs::catalogue(&app));
    assert!(matches!(runner.run_now("nope").await, Err(DomainError::NotFound(_))));
    assert!(runner.trigger("nope").is_err());
}
