//! Shared test helpers: an in-memory facade with scripted model and market fakes.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use newspulse::application::model_registry::LlmRegistry;
use newspulse::application::prompt::REPORT_SYSTEM_PROMPT;
use newspulse::config::Settings;
use newspulse::domain::entities::content_item::ContentItem;
use newspulse::domain::entities::market_data::*;
use newspulse::domain::entities::prediction::Prediction;
use newspulse::domain::entities::ticker::Ticker;
use newspulse::domain::error::DomainError;
use newspulse::domain::ports::embedding_port::{EmbeddingProvider, InputType};
use newspulse::domain::ports::llm_provider::{CompletionRequest, LlmProvider};
use newspulse::domain::ports::market_data_source::MarketDataSource;
use newspulse::domain::ports::notifier::Notifier;
use newspulse::domain::values::market_calendar::kst_date;
use newspulse::domain::values::priority::Priority;
use newspulse::infrastructure::cache::memory::MemoryCache;
use newspulse::infrastructure::embeddings::hashing::HashingProvider;
use newspulse::{NewsPulse, Providers};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SAMSUNG: &str = "005930";
pub const HYNIX: &str = "000660";

pub const PREDICTION_JSON: &str = r#"```json
{"sentiment_direction": "positive", "sentiment_score": 0.6, "impact_level": "high",
 "relevance_score": 0.9, "urgency_level": "short_term",
 "impact_analysis": {"business_impact": "메모리 수요 회복", "market_sentiment": "긍정적"},
 "reasoning": "실적 개선 기대"}
```"#;

pub const REPORT_JSON: &str = r#"{"overall_summary": "실적 개선 흐름", "short_term_scenario": "단기 반등",
 "risk_factors": ["환율"], "opportunity_factors": ["HBM 수요"], "recommendation": "매수",
 "price_targets": {"base_price": 70000, "short_term_target": 74000, "short_term_support": 68000}}"#;

/// Scripted LLM: answers prediction and report prompts with fixed JSON.
pub struct FakeLlm {
    tag: String,
    prediction: String,
    report: String,
    fail: bool,
    fail_next: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeLlm {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            prediction: PREDICTION_JSON.to_string(),
            report: REPORT_JSON.to_string(),
            fail: false,
            fail_next: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_prediction(mut self, raw: &str) -> Self {
        self.prediction = raw.to_string();
        self
    }

    pub fn with_report(mut self, raw: &str) -> Self {
        self.report = raw.to_string();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Fails the next `n` calls, then answers normally.
    pub fn failing_times(self, n: usize) -> Self {
        self.fail_next.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    fn provider_tag(&self) -> &str {
        &self.tag
    }

    async fn complete(&self, _model: &str, request: &CompletionRequest) -> Result<String, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let transient = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.fail || transient {
            return Err(DomainError::Provider("upstream 500".into()));
        }
        if request.system == REPORT_SYSTEM_PROMPT {
            Ok(self.report.clone())
        } else {
            Ok(self.prediction.clone())
        }
    }
}

/// Maps every text to the same unit vector, so any two items are identical.
pub struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn name(&self) -> &str {
        "constant"
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut v = vec![0f32; 16];
        v[0] = 1.0;
        Ok(texts.iter().map(|_| v.clone()).collect())
    }

    fn dimension(&self) -> usize {
        16
    }
}

/// Market source that serves one fixed quote for every code.
pub struct FakeMarket {
    pub price: f64,
    pub calls: AtomicUsize,
}

impl FakeMarket {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn unsupported(what: &str) -> DomainError {
    DomainError::Provider(format!("{what} not scripted"))
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn daily_chart(&self, code: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyBar>, DomainError> {
        self.hit();
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| bar(code, date, self.price, self.price, self.price))
            .collect())
    }

    async fn current_price(&self, code: &str) -> Result<CurrentPriceSnapshot, DomainError> {
        self.hit();
        Ok(CurrentPriceSnapshot {
            code: code.to_string(),
            datetime: Utc::now().naive_utc(),
            price: self.price,
            open: None,
            high: None,
            low: None,
            change: None,
            change_sign: None,
            change_rate: None,
            volume: None,
            trading_value: None,
        })
    }

    async fn minute_chart(&self, _code: &str) -> Result<Vec<MinuteBar>, DomainError> {
        Err(unsupported("minute chart"))
    }

    async fn minute_chart_on(&self, _code: &str, _date: NaiveDate) -> Result<Vec<MinuteBar>, DomainError> {
        Err(unsupported("minute chart"))
    }

    async fn orderbook(&self, _code: &str) -> Result<OrderbookSnapshot, DomainError> {
        Err(unsupported("orderbook"))
    }

    async fn investor_flows(&self, _code: &str) -> Result<Vec<InvestorFlow>, DomainError> {
        Err(unsupported("investor flows"))
    }

    async fn stock_info(&self, _code: &str) -> Result<StockInfo, DomainError> {
        Err(unsupported("stock info"))
    }

    async fn sector_index(&self, _sector_code: &str) -> Result<SectorIndexSnapshot, DomainError> {
        Err(unsupported("sector index"))
    }

    async fn index_daily(&self, _index_code: &str, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<IndexDailyBar>, DomainError> {
        Err(unsupported("index daily"))
    }

    async fn overtime_price(&self, code: &str) -> Result<OvertimePrice, DomainError> {
        self.hit();
        Ok(OvertimePrice {
            code: code.to_string(),
            date: kst_date(Utc::now()),
            price: self.price,
            change: None,
            change_sign: None,
            change_rate: None,
            volume: None,
            trading_value: None,
        })
    }

    async fn overtime_daily(&self, _code: &str) -> Result<Vec<OvertimePrice>, DomainError> {
        Err(unsupported("overtime daily"))
    }
}

/// Records every notification it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<i64>>,
}

impl RecordingNotifier {
    pub fn sent_ids(&self) -> Vec<i64> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, item: &ContentItem, _predictions: &[Prediction]) -> Result<(), DomainError> {
        self.sent.lock().unwrap().push(item.id);
        Ok(())
    }
}

pub struct Harness {
    pub settings: Settings,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llms: Vec<Arc<FakeLlm>>,
    pub market: Option<Arc<FakeMarket>>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            settings: Settings::for_tests(),
            embedder: Arc::new(HashingProvider::new(256)),
            llms: vec![Arc::new(FakeLlm::new("openai"))],
            market: None,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn with_llm(mut self, llm: FakeLlm) -> Self {
        self.llms.retain(|l| l.provider_tag() != llm.provider_tag());
        self.llms.push(Arc::new(llm));
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_market(mut self, market: FakeMarket) -> Self {
        self.market = Some(Arc::new(market));
        self
    }

    pub fn build(&self) -> NewsPulse {
        let mut registry = LlmRegistry::new();
        for llm in &self.llms {
            registry.register(llm.clone());
        }
        let providers = Providers {
            embedder: self.embedder.clone(),
            llms: registry,
            cache: Arc::new(MemoryCache::new()),
            market_source: self.market.clone().map(|m| m as Arc<dyn MarketDataSource>),
            notifiers: vec![self.notifier.clone()],
            feeds: Some(Vec::new()),
        };
        NewsPulse::with_providers(self.settings.clone(), providers).unwrap()
    }
}

/// Facade with the default fakes and a two-ticker watchlist.
pub fn setup() -> NewsPulse {
    let app = Harness::new().build();
    seed_watchlist(&app);
    app
}

pub fn seed_watchlist(app: &NewsPulse) {
    app.upsert_ticker(&Ticker::new(SAMSUNG, "삼성전자", Priority::new(1).unwrap()).unwrap())
        .unwrap();
    app.upsert_ticker(&Ticker::new(HYNIX, "SK하이닉스", Priority::new(2).unwrap()).unwrap())
        .unwrap();
}

pub fn news(title: &str, body: &str) -> ContentItem {
    ContentItem::new(title.to_string(), body.to_string(), Utc::now(), "네이버(한국경제)".to_string())
}

pub fn news_at(title: &str, body: &str, published_at: DateTime<Utc>) -> ContentItem {
    ContentItem::new(title.to_string(), body.to_string(), published_at, "네이버(한국경제)".to_string())
}

pub fn bar(code: &str, date: NaiveDate, high: f64, low: f64, close: f64) -> DailyBar {
    DailyBar {
        code: code.to_string(),
        date,
        open: close,
        high,
        low,
        close,
        volume: 1_000_000,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A daily close for yesterday (KST) so the price service always has an answer.
pub fn seed_close(app: &NewsPulse, code: &str, close: f64) {
    let yesterday = kst_date(Utc::now() - Duration::days(1));
    app.market_repo()
        .upsert_daily_bars(&[bar(code, yesterday, close, close, close)])
        .unwrap();
}
