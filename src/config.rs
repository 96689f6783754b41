//! Layered settings: built-in defaults, then an optional TOML file, then
//! `NEWSPULSE_*` environment variables (`__` separates nested keys, e.g.
//! `NEWSPULSE_LLM__MODEL=gpt-4o`).

use crate::application::collectors::CollectorSettings;
use crate::application::dedup::DedupSettings;
use crate::application::predict::PredictSettings;
use crate::application::report::ReportSettings;
use crate::domain::error::DomainError;
use crate::domain::values::content_type::ContentType;
use crate::infrastructure::feeds::reddit::RedditConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "newspulse.toml";
pub const CONFIG_PATH_ENV: &str = "NEWSPULSE_CONFIG";
pub const ENV_PREFIX: &str = "NEWSPULSE_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub kis: KisSettings,
    pub dart: DartSettings,
    pub reddit: RedditSettings,
    pub dedup: DedupConfig,
    pub telegram: TelegramSettings,
    pub logging: LoggingSettings,
    pub collectors: CollectorConfig,
    pub aliases_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "./newspulse.db".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Absent means an in-process cache.
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub ab_enabled: bool,
    pub ab_model_a: Option<String>,
    pub ab_model_b: Option<String>,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub cache_ttl_minutes: u64,
    pub auto_predict: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            ab_enabled: false,
            ab_model_a: None,
            ab_model_b: None,
            openai_api_key: None,
            openrouter_api_key: None,
            temperature: 0.3,
            max_tokens: 1000,
            cache_ttl_minutes: 60,
            auto_predict: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `noop`, `hash` or `openai`.
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub dimension: usize,
    pub similarity_threshold: f64,
    pub top_k: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "hash".into(),
            api_key: None,
            model: None,
            dimension: 256,
            similarity_threshold: 0.7,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KisSettings {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub base_url: Option<String>,
    pub sandbox: bool,
}

impl Default for KisSettings {
    fn default() -> Self {
        Self {
            app_key: None,
            app_secret: None,
            base_url: None,
            sandbox: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DartSettings {
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub subreddits: Vec<String>,
    pub keywords: Vec<String>,
    pub min_upvotes: i64,
    pub min_comments: i64,
    pub lookback_hours: i64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        let base = RedditConfig::default();
        Self {
            client_id: None,
            client_secret: None,
            user_agent: None,
            subreddits: base.subreddits,
            keywords: base.keywords,
            min_upvotes: base.min_upvotes,
            min_comments: base.min_comments,
            lookback_hours: base.lookback_hours,
        }
    }
}

impl RedditSettings {
    /// `None` until both OAuth credentials are configured.
    pub fn to_config(&self) -> Option<RedditConfig> {
        let client_id = self.client_id.clone().filter(|s| !s.is_empty())?;
        let client_secret = self.client_secret.clone().filter(|s| !s.is_empty())?;
        let base = RedditConfig::default();
        Some(RedditConfig {
            client_id,
            client_secret,
            user_agent: self.user_agent.clone().unwrap_or(base.user_agent),
            subreddits: self.subreddits.clone(),
            keywords: self.keywords.clone(),
            min_upvotes: self.min_upvotes,
            min_comments: self.min_comments,
            lookback_hours: self.lookback_hours,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub text_threshold: f64,
    pub lookback_hours: i64,
    pub embedding_skip_threshold: f64,
    pub embedding_medium_threshold: f64,
    pub embedding_top_k: usize,
    pub exempt_content_types: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let base = DedupSettings::default();
        Self {
            text_threshold: base.text_threshold,
            lookback_hours: base.lookback.num_hours(),
            embedding_skip_threshold: base.embedding_skip_threshold,
            embedding_medium_threshold: base.embedding_medium_threshold,
            embedding_top_k: base.embedding_top_k,
            exempt_content_types: Vec::new(),
        }
    }
}

impl DedupConfig {
    pub fn to_settings(&self) -> Result<DedupSettings, DomainError> {
        let exempt_content_types = self
            .exempt_content_types
            .iter()
            .map(|s| s.parse::<ContentType>().map_err(DomainError::Config))
            .collect::<Result<_, _>>()?;
        Ok(DedupSettings {
            text_threshold: self.text_threshold,
            lookback: chrono::Duration::hours(self.lookback_hours),
            embedding_skip_threshold: self.embedding_skip_threshold,
            embedding_medium_threshold: self.embedding_medium_threshold,
            embedding_top_k: self.embedding_top_k,
            exempt_content_types,
            ..DedupSettings::default()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Directory for daily-rolling JSON logs; stdout only when absent.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub batch_size: usize,
    pub rate_limit_seconds: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            rate_limit_seconds: 1.0,
        }
    }
}

impl Settings {
    /// Defaults, then `NEWSPULSE_CONFIG` or `./newspulse.toml` when present, then the environment.
    pub fn load() -> Result<Self, DomainError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(Some(&path))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, DomainError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DomainError::Config(e.to_string()))
    }

    /// In-memory database, hashing embedder, no external credentials.
    pub fn for_tests() -> Self {
        Self {
            database: DatabaseSettings {
                path: ":memory:".into(),
            },
            ..Self::default()
        }
    }

    pub fn predict_settings(&self) -> PredictSettings {
        PredictSettings {
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            cache_ttl: Duration::from_secs(self.llm.cache_ttl_minutes * 60),
            top_k: self.embedding.top_k,
            similarity_threshold: self.embedding.similarity_threshold,
        }
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            temperature: self.llm.temperature,
            ..ReportSettings::default()
        }
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            batch_size: self.collectors.batch_size.clamp(1, 10),
            rate_limit: Duration::from_secs_f64(self.collectors.rate_limit_seconds.max(0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.llm.temperature, 0.3);
        assert_eq!(s.llm.max_tokens, 1000);
        assert_eq!(s.llm.cache_ttl_minutes, 60);
        assert!(s.llm.auto_predict);
        assert_eq!(s.embedding.top_k, 5);
        assert_eq!(s.reddit.min_upvotes, 10);
        assert_eq!(s.dedup.text_threshold, 0.8);
        assert!(s.kis.sandbox);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\nmodel = \"gpt-4o\"\nab_enabled = true\n\n[dedup]\nexempt_content_types = [\"disclosure\"]\n\n[database]\npath = \"/tmp/x.db\""
        )
        .unwrap();
        let s = Settings::load_from(Some(file.path())).unwrap();
        assert_eq!(s.llm.model, "gpt-4o");
        assert!(s.llm.ab_enabled);
        assert_eq!(s.llm.provider, "openai");
        assert_eq!(s.database.path, "/tmp/x.db");
        let dedup = s.dedup.to_settings().unwrap();
        assert!(dedup.exempt_content_types.contains(&ContentType::Disclosure));
    }

    #[test]
    fn test_unknown_exempt_type_is_config_error() {
        let cfg = DedupConfig {
            exempt_content_types: vec!["podcast".into()],
            ..Default::default()
        };
        assert!(matches!(cfg.to_settings(), Err(DomainError::Config(_))));
    }

    #[test]
    fn test_reddit_requires_credentials() {
        let mut r = RedditSettings::default();
        assert!(r.to_config().is_none());
        r.client_id = Some("id".into());
        r.client_secret = Some("secret".into());
        let cfg = r.to_config().unwrap();
        assert_eq!(cfg.min_comments, 2);
    }
}
