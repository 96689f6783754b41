use super::{KisConfig, KisError};
use crate::domain::ports::cache::KeyValueCache;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;

pub const TOKEN_KEY: &str = "kis:access_token";
pub const EXPIRES_KEY: &str = "kis:token_expires_at";

/// Tokens with less life left than this are refreshed.
const REFRESH_MARGIN_SECS: i64 = 300;
/// Cache entries outlive the token slightly so the expiry key is always readable.
const CACHE_TTL_MARGIN_SECS: u64 = 600;
const DEFAULT_EXPIRES_IN: i64 = 86_400;

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Owner of the shared bearer token.
///
/// The token lives in the cache so every process sees the same value; the
/// refresh lock makes sure at most one exchange happens per process at a time.
pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    app_key: String,
    app_secret: String,
    cache: Arc<dyn KeyValueCache>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(config: &KisConfig, cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.clone(),
            app_key: config.app_key.clone(),
            app_secret: config.app_secret.clone(),
            cache,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Process-wide instance per (base URL, app key, cache).
    ///
    /// Clients built over different cache instances get separate managers, so a
    /// manager never reads or writes a cache other than the one it was given.
    pub fn shared(config: &KisConfig, cache: Arc<dyn KeyValueCache>) -> Arc<Self> {
        static INSTANCES: OnceLock<StdMutex<HashMap<String, Arc<TokenManager>>>> = OnceLock::new();
        let cache_id = Arc::as_ptr(&cache) as *const () as usize;
        let key = format!("{}|{}|{cache_id:x}", config.base_url, config.app_key);
        let registry = INSTANCES.get_or_init(|| StdMutex::new(HashMap::new()));
        let mut map = match registry.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(key)
            .or_insert_with(|| Arc::new(Self::new(config, cache)))
            .clone()
    }

    pub async fn access_token(&self) -> Result<String, KisError> {
        if let Some(token) = self.cached_token().await? {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached_token().await? {
            return Ok(token);
        }

        match self.exchange().await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.invalidate().await;
                Err(e)
            }
        }
    }

    pub async fn invalidate(&self) {
        for key in [TOKEN_KEY, EXPIRES_KEY] {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!(key, error = %e, "Failed to clear cached KIS token");
            }
        }
    }

    async fn cached_token(&self) -> Result<Option<String>, KisError> {
        let token = self
            .cache
            .get(TOKEN_KEY)
            .await
            .map_err(|e| KisError::Token(e.to_string()))?;
        let expires_at = self
            .cache
            .get(EXPIRES_KEY)
            .await
            .map_err(|e| KisError::Token(e.to_string()))?
            .and_then(|s| s.parse::<i64>().ok());

        match (token, expires_at) {
            (Some(token), Some(expires_at)) if expires_at - Utc::now().timestamp() > REFRESH_MARGIN_SECS => {
                Ok(Some(token))
            }
            _ => Ok(None),
        }
    }

    async fn exchange(&self) -> Result<String, KisError> {
        let url = format!("{}/oauth2/tokenP", self.base_url);
        let payload = serde_json::json!({
            "grant_type": "client_credentials",
            "appkey": self.app_key,
            "appsecret": self.app_secret,
        });

        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| KisError::Token(format!("token request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(KisError::Token(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| KisError::Token(format!("invalid token response: {e}")))?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let expires_at = Utc::now().timestamp() + expires_in;
        let ttl = Some(Duration::from_secs(expires_in.max(0) as u64 + CACHE_TTL_MARGIN_SECS));

        self.cache
            .set(TOKEN_KEY, &token.access_token, ttl)
            .await
            .map_err(|e| KisError::Token(e.to_string()))?;
        self.cache
            .set(EXPIRES_KEY, &expires_at.to_string(), ttl)
            .await
            .map_err(|e| KisError::Token(e.to_string()))?;

        tracing::info!(expires_in, "Issued new KIS access token");
        Ok(token.access_token)
    }
}
