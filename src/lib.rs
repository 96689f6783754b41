pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod jobs;
pub mod logging;

use crate::application::collectors::{CollectReport, MarketCollector};
use crate::application::embed::{EmbedUseCase, ReconcileReport, SimilarItem};
use crate::application::evaluate::{EvaluateUseCase, EvaluationRun};
use crate::application::ingest::{IngestUseCase, SaveOutcome};
use crate::application::maintenance::{CleanupReport, EncodingCleanupUseCase};
use crate::application::model_registry::{LlmRegistry, ModelRegistry};
use crate::application::notify::{NotifyRun, NotifyUseCase};
use crate::application::predict::{PendingReport, PredictOutcome, PredictUseCase};
use crate::application::price_match::{MatchRun, PriceMatchUseCase, DEFAULT_LOOKBACK_DAYS};
use crate::application::price_service::{PriceQuote, PriceService};
use crate::application::report::{ReportBatch, ReportUseCase};
use crate::application::stats::{PipelineStats, StatsUseCase};
use crate::application::ticker_mapper::TickerMapper;
use crate::config::Settings;
use crate::domain::entities::content_item::ContentItem;
use crate::domain::entities::evaluation::{DailyModelPerformance, ModelEvaluation};
use crate::domain::entities::model::{AbConfig, Model};
use crate::domain::entities::report::AnalysisSummary;
use crate::domain::entities::ticker::Ticker;
use crate::domain::error::DomainError;
use crate::domain::ports::cache::KeyValueCache;
use crate::domain::ports::content_repository::ContentRepository;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::evaluation_repository::{EvaluationRepository, HumanRatings};
use crate::domain::ports::market_data_repository::MarketDataRepository;
use crate::domain::ports::market_data_source::MarketDataSource;
use crate::domain::ports::model_repository::ModelRepository;
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::prediction_repository::PredictionRepository;
use crate::domain::ports::report_repository::ReportRepository;
use crate::domain::ports::ticker_repository::TickerRepository;
use crate::domain::ports::vector_store::VectorStore;
use crate::domain::values::priority::Priority;
use crate::infrastructure::cache::memory::MemoryCache;
use crate::infrastructure::cache::redis::RedisCache;
use crate::infrastructure::embeddings::hashing::HashingProvider;
use crate::infrastructure::embeddings::noop::NoopProvider;
use crate::infrastructure::embeddings::openai::OpenAiProvider;
use crate::infrastructure::encoding::repair_text;
use crate::infrastructure::feeds::dart::DartFeed;
use crate::infrastructure::feeds::naver_news::NaverNewsFeed;
use crate::infrastructure::feeds::naver_search::NaverSearchFeed;
use crate::infrastructure::feeds::reddit::RedditFeed;
use crate::infrastructure::feeds::{Feed, FeedResult};
use crate::infrastructure::kis::client::KisClient;
use crate::infrastructure::kis::market_data::KisMarketData;
use crate::infrastructure::kis::KisConfig;
use crate::infrastructure::llm::openai_compat::OpenAiCompatProvider;
use crate::infrastructure::notifiers::log::LogNotifier;
use crate::infrastructure::notifiers::telegram::TelegramNotifier;
use crate::infrastructure::sqlite::content_repo::SqliteContentRepo;
use crate::infrastructure::sqlite::evaluation_repo::SqliteEvaluationRepo;
use crate::infrastructure::sqlite::market_data_repo::SqliteMarketDataRepo;
use crate::infrastructure::sqlite::model_repo::SqliteModelRepo;
use crate::infrastructure::sqlite::open_connection;
use crate::infrastructure::sqlite::prediction_repo::SqlitePredictionRepo;
use crate::infrastructure::sqlite::report_repo::SqliteReportRepo;
use crate::infrastructure::sqlite::ticker_repo::SqliteTickerRepo;
use crate::infrastructure::sqlite::vector_store::SqliteVectorStore;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Items requested from a feed per ingestion pass.
pub const FEED_FETCH_LIMIT: usize = 100;

/// Days of history the daily reconciliation pass looks at.
pub const RECONCILE_LOOKBACK_DAYS: i64 = 7;

/// Swappable outer dependencies. Production builds them from [`Settings`];
/// tests pass fakes.
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llms: LlmRegistry,
    pub cache: Arc<dyn KeyValueCache>,
    pub market_source: Option<Arc<dyn MarketDataSource>>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
    /// `None` builds the configured feeds.
    pub feeds: Option<Vec<Arc<dyn Feed>>>,
}

impl Providers {
    pub fn from_settings(settings: &Settings) -> Result<Self, DomainError> {
        let embedder: Arc<dyn EmbeddingProvider> = match settings.embedding.provider.as_str() {
            "openai" => {
                let key = settings
                    .embedding
                    .api_key
                    .clone()
                    .or_else(|| settings.llm.openai_api_key.clone())
                    .ok_or_else(|| DomainError::Config("embedding.provider=openai needs an API key".into()))?;
                Arc::new(OpenAiProvider::new(key, settings.embedding.model.clone()))
            }
            "hash" => Arc::new(HashingProvider::new(settings.embedding.dimension)),
            "noop" => Arc::new(NoopProvider),
            other => return Err(DomainError::Config(format!("unknown embedding provider '{other}'"))),
        };

        let mut llms = LlmRegistry::new();
        if let Some(key) = settings.llm.openai_api_key.clone() {
            llms.register(Arc::new(OpenAiCompatProvider::openai(key)));
        }
        if let Some(key) = settings.llm.openrouter_api_key.clone() {
            llms.register(Arc::new(OpenAiCompatProvider::openrouter(key)));
        }

        let cache: Arc<dyn KeyValueCache> = match &settings.cache.redis_url {
            Some(url) => Arc::new(RedisCache::new(url)?),
            None => Arc::new(MemoryCache::new()),
        };

        let market_source: Option<Arc<dyn MarketDataSource>> =
            match (&settings.kis.app_key, &settings.kis.app_secret) {
                (Some(key), Some(secret)) => {
                    let mut config = if settings.kis.sandbox {
                        KisConfig::sandbox(key.clone(), secret.clone())
                    } else {
                        KisConfig::production(key.clone(), secret.clone())
                    };
                    if let Some(url) = &settings.kis.base_url {
                        config = config.with_base_url(url.clone());
                    }
                    let client = KisClient::new(config, cache.clone()).map_err(DomainError::from)?;
                    Some(Arc::new(KisMarketData::new(client)))
                }
                _ => None,
            };

        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        match (&settings.telegram.bot_token, &settings.telegram.chat_id) {
            (Some(token), Some(chat)) => notifiers.push(Arc::new(TelegramNotifier::new(token.clone(), chat.clone()))),
            _ => notifiers.push(Arc::new(LogNotifier)),
        }

        Ok(Self {
            embedder,
            llms,
            cache,
            market_source,
            notifiers,
            feeds: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WatchlistEntry {
    code: String,
    name: String,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

pub struct NewsPulse {
    settings: Settings,
    tickers: Arc<dyn TickerRepository>,
    content_repo: Arc<dyn ContentRepository>,
    prediction_repo: Arc<dyn PredictionRepository>,
    market_repo: Arc<dyn MarketDataRepository>,
    report_repo: Arc<dyn ReportRepository>,
    vector_store: Arc<dyn VectorStore>,
    registry: Arc<ModelRegistry>,
    embed: Arc<EmbedUseCase>,
    prices: Arc<PriceService>,
    predict: Arc<PredictUseCase>,
    ingest: Arc<IngestUseCase>,
    report_uc: ReportUseCase,
    evaluate_uc: EvaluateUseCase,
    price_match_uc: PriceMatchUseCase,
    notify_uc: NotifyUseCase,
    cleanup_uc: EncodingCleanupUseCase,
    stats_uc: StatsUseCase,
    collector: Option<MarketCollector>,
    feeds: Vec<Arc<dyn Feed>>,
}

impl NewsPulse {
    pub fn new(settings: Settings) -> Result<Self, DomainError> {
        let providers = Providers::from_settings(&settings)?;
        Self::with_providers(settings, providers)
    }

    pub fn with_providers(settings: Settings, providers: Providers) -> Result<Self, DomainError> {
        let conn = open_connection(&settings.database.path)?;
        let tickers: Arc<dyn TickerRepository> = Arc::new(SqliteTickerRepo::new(conn.clone()));
        let content_repo: Arc<dyn ContentRepository> = Arc::new(SqliteContentRepo::new(conn.clone()));
        let prediction_repo: Arc<dyn PredictionRepository> = Arc::new(SqlitePredictionRepo::new(conn.clone()));
        let model_repo: Arc<dyn ModelRepository> = Arc::new(SqliteModelRepo::new(conn.clone()));
        let report_repo: Arc<dyn ReportRepository> = Arc::new(SqliteReportRepo::new(conn.clone()));
        let evaluation_repo: Arc<dyn EvaluationRepository> = Arc::new(SqliteEvaluationRepo::new(conn.clone()));
        let market_repo: Arc<dyn MarketDataRepository> = Arc::new(SqliteMarketDataRepo::new(conn.clone()));
        let vector_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(conn));

        let dedup = settings.dedup.to_settings()?;
        let registry = Arc::new(
            ModelRegistry::new(model_repo.clone(), providers.llms)
                .with_default(&settings.llm.provider, &settings.llm.model),
        );
        registry.ensure_default()?;
        if settings.llm.ab_enabled {
            match (&settings.llm.ab_model_a, &settings.llm.ab_model_b) {
                (Some(a), Some(b)) => {
                    if let Err(e) = registry.set_ab(a, b) {
                        warn!(error = %e, "Configured A/B pair could not be activated");
                    }
                }
                _ => warn!("llm.ab_enabled is set but ab_model_a/ab_model_b are missing"),
            }
        }

        let embed = Arc::new(EmbedUseCase::new(
            content_repo.clone(),
            market_repo.clone(),
            providers.embedder,
            vector_store.clone(),
            dedup.clone(),
        ));
        embed.check_dimension();

        let prices = Arc::new(PriceService::new(market_repo.clone(), providers.market_source.clone()));
        let predict = Arc::new(PredictUseCase::new(
            content_repo.clone(),
            prediction_repo.clone(),
            tickers.clone(),
            registry.clone(),
            embed.clone(),
            prices.clone(),
            providers.cache,
            settings.predict_settings(),
        ));

        let mapper = TickerMapper::load(tickers.as_ref(), settings.aliases_path.as_deref())?;
        let mut ingest = IngestUseCase::new(content_repo.clone(), mapper, &dedup, embed.clone())
            .with_text_repair(repair_text);
        if settings.llm.auto_predict {
            ingest = ingest.with_auto_predict(predict.clone());
        }

        let collector = providers.market_source.clone().map(|source| {
            MarketCollector::new(
                tickers.clone(),
                market_repo.clone(),
                source,
                settings.collector_settings(),
            )
        });

        let feeds = match providers.feeds {
            Some(feeds) => feeds,
            None => Self::configured_feeds(&settings, tickers.clone()),
        };

        Ok(Self {
            report_uc: ReportUseCase::new(
                tickers.clone(),
                content_repo.clone(),
                prediction_repo.clone(),
                report_repo.clone(),
                registry.clone(),
                prices.clone(),
                settings.report_settings(),
            ),
            evaluate_uc: EvaluateUseCase::new(
                report_repo.clone(),
                evaluation_repo,
                market_repo.clone(),
                prediction_repo.clone(),
                model_repo,
            ),
            price_match_uc: PriceMatchUseCase::new(content_repo.clone(), market_repo.clone()),
            notify_uc: NotifyUseCase::new(
                content_repo.clone(),
                prediction_repo.clone(),
                embed.clone(),
                providers.notifiers,
            ),
            cleanup_uc: EncodingCleanupUseCase::new(content_repo.clone(), repair_text),
            stats_uc: StatsUseCase::new(content_repo.clone(), prediction_repo.clone(), vector_store.clone()),
            ingest: Arc::new(ingest),
            settings,
            tickers,
            content_repo,
            prediction_repo,
            market_repo,
            report_repo,
            vector_store,
            registry,
            embed,
            prices,
            predict,
            collector,
            feeds,
        })
    }

    fn configured_feeds(settings: &Settings, tickers: Arc<dyn TickerRepository>) -> Vec<Arc<dyn Feed>> {
        let mut feeds: Vec<Arc<dyn Feed>> = Vec::new();
        match NaverNewsFeed::new() {
            Ok(f) => feeds.push(Arc::new(f)),
            Err(e) => warn!(error = %e, "Portal news feed disabled"),
        }
        match NaverSearchFeed::new(tickers.clone()) {
            Ok(f) => feeds.push(Arc::new(f)),
            Err(e) => warn!(error = %e, "Search feed disabled"),
        }
        match DartFeed::new(settings.dart.api_key.clone(), tickers) {
            Ok(f) => feeds.push(Arc::new(f)),
            Err(e) => warn!(error = %e, "Disclosure feed disabled"),
        }
        match settings.reddit.to_config().map(RedditFeed::new) {
            Some(Ok(f)) => feeds.push(Arc::new(f)),
            Some(Err(e)) => warn!(error = %e, "Reddit feed disabled"),
            None => info!("Reddit credentials not configured; social feed disabled"),
        }
        feeds
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn content_repo(&self) -> Arc<dyn ContentRepository> {
        self.content_repo.clone()
    }

    pub fn prediction_repo(&self) -> Arc<dyn PredictionRepository> {
        self.prediction_repo.clone()
    }

    pub fn market_repo(&self) -> Arc<dyn MarketDataRepository> {
        self.market_repo.clone()
    }

    pub fn report_repo(&self) -> Arc<dyn ReportRepository> {
        self.report_repo.clone()
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    pub fn registry(&self) -> Arc<ModelRegistry> {
        self.registry.clone()
    }

    // Watchlist

    pub fn upsert_ticker(&self, ticker: &Ticker) -> Result<(), DomainError> {
        self.tickers.upsert(ticker)?;
        self.reload_mapper()
    }

    /// Loads a JSON array of `{code, name, priority?, active?}` into the watchlist.
    pub fn seed_watchlist(&self, path: &Path) -> Result<usize, DomainError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
        let entries: Vec<WatchlistEntry> =
            serde_json::from_str(&raw).map_err(|e| DomainError::Parse(format!("watchlist: {e}")))?;
        for entry in &entries {
            let priority = match entry.priority {
                Some(p) => Priority::new(p).map_err(DomainError::InvalidInput)?,
                None => Priority::default(),
            };
            let mut ticker = Ticker::new(&entry.code, &entry.name, priority).map_err(DomainError::InvalidInput)?;
            ticker.active = entry.active;
            self.tickers.upsert(&ticker)?;
        }
        self.reload_mapper()?;
        info!(count = entries.len(), "Watchlist seeded");
        Ok(entries.len())
    }

    pub fn watchlist(&self) -> Result<Vec<Ticker>, DomainError> {
        self.tickers.list_active()
    }

    pub fn reload_mapper(&self) -> Result<(), DomainError> {
        let mapper = TickerMapper::load(self.tickers.as_ref(), self.settings.aliases_path.as_deref())?;
        self.ingest.replace_mapper(mapper);
        Ok(())
    }

    // Models

    pub fn add_model(
        &self,
        name: &str,
        provider: &str,
        model_identifier: &str,
        description: Option<String>,
    ) -> Result<Model, DomainError> {
        self.registry.add_model(name, provider, model_identifier, description)
    }

    pub fn set_ab(&self, model_a: &str, model_b: &str) -> Result<AbConfig, DomainError> {
        self.registry.set_ab(model_a, model_b)
    }

    pub fn clear_ab(&self) -> Result<(), DomainError> {
        self.registry.clear_ab()
    }

    // Ingestion

    pub fn feed_names(&self) -> Vec<String> {
        self.feeds.iter().map(|f| f.name().to_string()).collect()
    }

    pub async fn save_item(&self, item: ContentItem) -> SaveOutcome {
        self.ingest.save(item).await
    }

    /// Saves already-fetched items and reports them as one feed pass.
    pub async fn ingest_items(&self, feed_name: &str, items: Vec<ContentItem>) -> FeedResult {
        let mut result = FeedResult::new(feed_name);
        result.entries_fetched = items.len();
        let counts = self.ingest.save_all(items).await;
        result.entries_added = counts.added;
        result.entries_deduped = counts.deduped;
        result.entries_dropped = counts.dropped;
        if counts.failed > 0 {
            result.errors.push(format!("{} items failed to store", counts.failed));
        }
        result
    }

    pub async fn ingest_feed(&self, name: &str) -> Result<FeedResult, DomainError> {
        let feed = self
            .feeds
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("feed '{name}' (available: {})", self.feed_names().join(", "))))?;
        let items = match feed.fetch_recent(FEED_FETCH_LIMIT).await {
            Ok(items) => items,
            Err(e) => {
                warn!(feed = name, error = %e, "Feed fetch failed");
                let mut result = FeedResult::new(name);
                result.errors.push(e.to_string());
                return Ok(result);
            }
        };
        let result = self.ingest_items(name, items).await;
        info!(
            feed = name,
            fetched = result.entries_fetched,
            added = result.entries_added,
            deduped = result.entries_deduped,
            dropped = result.entries_dropped,
            "Feed ingested"
        );
        Ok(result)
    }

    // Retrieval and prediction

    pub async fn similar(&self, text: &str, ticker: Option<&str>) -> Result<Vec<SimilarItem>, DomainError> {
        let hits = self
            .embed
            .similar(
                text,
                ticker,
                self.settings.embedding.top_k,
                self.settings.embedding.similarity_threshold,
            )
            .await?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(item) = self.content_repo.get_by_id(hit.content_item_id)? {
                let price_changes = self
                    .market_repo
                    .price_match(item.id)?
                    .map(|m| m.changes)
                    .filter(|c| !c.is_empty());
                out.push(SimilarItem {
                    item,
                    similarity: hit.similarity,
                    price_changes,
                });
            }
        }
        Ok(out)
    }

    pub async fn predict_item(&self, content_item_id: i64) -> Result<PredictOutcome, DomainError> {
        self.predict.predict_by_id(content_item_id).await
    }

    /// Embeds recent items that lack vectors, then predicts items that lack predictions.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<(ReconcileReport, PendingReport), DomainError> {
        let since = now - chrono::Duration::days(RECONCILE_LOOKBACK_DAYS);
        let embedded = self.embed.reconcile(since).await?;
        let predicted = self.predict.predict_pending(since).await?;
        Ok((embedded, predicted))
    }

    pub async fn current_price(&self, ticker: &str, now: DateTime<Utc>) -> Result<Option<PriceQuote>, DomainError> {
        self.prices.current_price(ticker, now).await
    }

    pub fn match_prices(&self, now: DateTime<Utc>) -> Result<MatchRun, DomainError> {
        self.price_match_uc.run(now, DEFAULT_LOOKBACK_DAYS)
    }

    pub async fn notify_recent(&self, now: DateTime<Utc>) -> Result<NotifyRun, DomainError> {
        self.notify_uc.run(now).await
    }

    // Reports and evaluation

    pub async fn generate_report(&self, ticker: &str) -> Result<AnalysisSummary, DomainError> {
        self.report_uc.generate(ticker).await
    }

    pub async fn generate_reports(&self, max_priority: u8) -> Result<ReportBatch, DomainError> {
        self.report_uc.generate_for_priority(max_priority).await
    }

    pub fn latest_report(&self, ticker: &str) -> Result<Option<AnalysisSummary>, DomainError> {
        self.report_uc.latest(ticker)
    }

    pub fn report_history(&self, ticker: &str, limit: usize) -> Result<Vec<AnalysisSummary>, DomainError> {
        self.report_uc.history(ticker, limit)
    }

    pub fn evaluate(&self, now: DateTime<Utc>) -> Result<EvaluationRun, DomainError> {
        self.evaluate_uc.evaluate_pending(now)
    }

    pub fn evaluations_for_report(&self, report_id: i64) -> Result<Vec<ModelEvaluation>, DomainError> {
        self.evaluate_uc.evaluations_for_report(report_id)
    }

    pub fn rate(&self, evaluation_id: i64, quality: u8, usefulness: u8, overall: u8) -> Result<ModelEvaluation, DomainError> {
        let ratings = HumanRatings::new(quality, usefulness, overall).map_err(DomainError::InvalidInput)?;
        self.evaluate_uc.rate(evaluation_id, ratings, Utc::now())
    }

    pub fn aggregate_daily(&self, date: NaiveDate) -> Result<Vec<DailyModelPerformance>, DomainError> {
        self.evaluate_uc.aggregate_daily(date, Utc::now())
    }

    pub fn daily_performance(&self, date: NaiveDate) -> Result<Vec<DailyModelPerformance>, DomainError> {
        self.evaluate_uc.daily_performance(date)
    }

    // Market data

    pub fn collector(&self) -> Result<&MarketCollector, DomainError> {
        self.collector
            .as_ref()
            .ok_or_else(|| DomainError::Config("KIS credentials (kis.app_key, kis.app_secret) are not configured".into()))
    }

    pub async fn backfill_daily(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        self.collector()?.backfill_daily(from, to).await
    }

    pub async fn backfill_overtime(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        self.collector()?.backfill_overtime(from, to).await
    }

    pub async fn backfill_index(&self, from: NaiveDate, to: NaiveDate) -> Result<CollectReport, DomainError> {
        self.collector()?.backfill_index(from, to).await
    }

    // Maintenance

    pub fn cleanup_encoding(&self, dry_run: bool) -> Result<CleanupReport, DomainError> {
        self.cleanup_uc.execute(dry_run)
    }

    pub fn stats(&self) -> Result<PipelineStats, DomainError> {
        self.stats_uc.stats()
    }
}
