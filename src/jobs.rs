//! The scheduled job table.
//!
//! Every handler returns a one-line summary that ends up in the job stats.

use crate::domain::error::DomainError;
use crate::domain::values::market_calendar::{is_trading_day, kst_date};
use crate::infrastructure::scheduler::{JobSpec, Trigger};
use crate::NewsPulse;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;

/// Reports are generated for priority 1-2 tickers only.
pub const REPORT_MAX_PRIORITY: u8 = 2;

fn job<F, Fut>(app: &Arc<NewsPulse>, id: &str, description: &str, triggers: Vec<Trigger>, handler: F) -> JobSpec
where
    F: Fn(Arc<NewsPulse>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, DomainError>> + Send + 'static,
{
    let app = app.clone();
    JobSpec::new(id, description, triggers, move || handler(app.clone()))
}

fn feed_job(app: &Arc<NewsPulse>, feed: &str) -> JobSpec {
    let minutes = match feed {
        "naver_news" => 5,
        _ => 10,
    };
    let name = feed.to_string();
    job(
        app,
        &format!("ingest_{feed}"),
        &format!("Fetch and ingest the {feed} feed"),
        vec![Trigger::every(minutes)],
        move |app| ingest(app, name.clone()),
    )
}

/// Builds the full job table. Market-data jobs are included only when a
/// KIS client is configured.
pub fn catalogue(app: &Arc<NewsPulse>) -> Vec<JobSpec> {
    let mut jobs: Vec<JobSpec> = app.feed_names().iter().map(|feed| feed_job(app, feed)).collect();

    jobs.extend([
        job(app, "auto_notify", "Notify recent un-notified predicted items", vec![Trigger::every(10)], notify),
        job(app, "embedding_reconcile", "Embed and predict items missed by ingestion", vec![Trigger::at(16, 0)], reconcile),
        job(app, "price_match", "Match recent news with realised price changes", vec![Trigger::at(15, 40)], price_match),
        job(
            app,
            "reports",
            "Generate analysis reports for core tickers",
            vec![Trigger::at(9, 15), Trigger::at(13, 0), Trigger::at(15, 40)],
            reports,
        ),
        job(app, "evaluation", "Score matured reports against realised prices", vec![Trigger::at(16, 30)], evaluation),
        job(app, "daily_aggregation", "Aggregate per-model daily performance", vec![Trigger::at(17, 0)], aggregation),
    ]);

    if app.collector().is_ok() {
        jobs.extend([
            job(app, "collect_minute", "Minute bars (market hours)", vec![Trigger::every(1)], collect_minute),
            job(app, "collect_current", "Current prices (market hours)", vec![Trigger::every(5)], collect_current),
            job(app, "collect_orderbook", "Orderbook snapshots (market hours)", vec![Trigger::every(10)], collect_orderbook),
            job(app, "collect_daily", "Daily OHLCV", vec![Trigger::at(15, 35)], collect_daily),
            job(app, "collect_investor", "Investor flows", vec![Trigger::at(15, 45)], collect_investor),
            job(app, "collect_sector", "Sector index snapshots", vec![Trigger::at(15, 50)], collect_sector),
            job(app, "collect_index_daily", "Market index daily bars", vec![Trigger::at(16, 10)], collect_index_daily),
            job(app, "collect_overtime", "After-hours trading", vec![Trigger::at(18, 10)], collect_overtime),
            job(app, "collect_stock_info", "Stock master info", vec![Trigger::at(8, 0)], collect_stock_info),
        ]);
    }
    jobs
}

async fn ingest(app: Arc<NewsPulse>, feed: String) -> Result<String, DomainError> {
    let r = app.ingest_feed(&feed).await?;
    Ok(format!(
        "fetched={} added={} deduped={} dropped={} errors={}",
        r.entries_fetched,
        r.entries_added,
        r.entries_deduped,
        r.entries_dropped,
        r.errors.len()
    ))
}

async fn notify(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let r = app.notify_recent(Utc::now()).await?;
    Ok(format!(
        "candidates={} sent={} suppressed={} held={} failed={}",
        r.candidates, r.sent, r.suppressed, r.held, r.failed
    ))
}

async fn reconcile(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let (embedded, predicted) = app.reconcile(Utc::now()).await?;
    Ok(format!(
        "embedded={}/{} predicted={}/{} failed={}",
        embedded.embedded,
        embedded.candidates,
        predicted.predicted,
        predicted.candidates,
        embedded.failed + predicted.failed
    ))
}

async fn price_match(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let r = app.match_prices(Utc::now())?;
    Ok(format!(
        "candidates={} matched={} complete={} unmatched={}",
        r.candidates, r.matched, r.already_complete, r.unmatched
    ))
}

async fn reports(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let r = app.generate_reports(REPORT_MAX_PRIORITY).await?;
    Ok(format!("generated={} failed={}", r.generated.len(), r.failed.len()))
}

async fn evaluation(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let r = app.evaluate(Utc::now())?;
    Ok(format!(
        "reports={} evaluated={} already={} awaiting={} incomplete={}",
        r.reports, r.evaluated, r.already_evaluated, r.awaiting_prices, r.incomplete
    ))
}

async fn aggregation(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    let today = kst_date(Utc::now());
    let rows = app.aggregate_daily(today)?;
    Ok(format!("date={today} models={}", rows.len()))
}

/// Calendar collectors do nothing on weekends and KRX holidays.
fn not_trading_today(kind: &str) -> Option<String> {
    let today = kst_date(Utc::now());
    (!is_trading_day(today)).then(|| format!("{kind}: skipped, {today} is not a trading day"))
}

async fn collect_minute(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    Ok(app.collector()?.collect_minute_bars(Utc::now()).await?.summary())
}

async fn collect_current(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    Ok(app.collector()?.collect_current_prices(Utc::now()).await?.summary())
}

async fn collect_orderbook(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    Ok(app.collector()?.collect_orderbooks(Utc::now()).await?.summary())
}

async fn collect_daily(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    if let Some(skip) = not_trading_today("daily") {
        return Ok(skip);
    }
    Ok(app.collector()?.collect_daily_bars(Utc::now()).await?.summary())
}

async fn collect_investor(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    if let Some(skip) = not_trading_today("investor") {
        return Ok(skip);
    }
    Ok(app.collector()?.collect_investor_flows().await?.summary())
}

async fn collect_sector(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    if let Some(skip) = not_trading_today("sector") {
        return Ok(skip);
    }
    Ok(app.collector()?.collect_sector_indices().await?.summary())
}

async fn collect_index_daily(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    if let Some(skip) = not_trading_today("index_daily") {
        return Ok(skip);
    }
    Ok(app.collector()?.collect_index_daily(Utc::now()).await?.summary())
}

async fn collect_overtime(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    if let Some(skip) = not_trading_today("overtime") {
        return Ok(skip);
    }
    Ok(app.collector()?.collect_overtime().await?.summary())
}

async fn collect_stock_info(app: Arc<NewsPulse>) -> Result<String, DomainError> {
    Ok(app.collector()?.collect_stock_info().await?.summary())
}
