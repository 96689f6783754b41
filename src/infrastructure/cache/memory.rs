use crate::domain::error::DomainError;
use crate::domain::ports::cache::KeyValueCache;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Process-local cache with per-key expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, (String, Option<Instant>)>) -> T) -> Result<T, DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Database(format!("cache lock poisoned: {e}")))?;
        Ok(f(&mut entries))
    }
}

#[async_trait::async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.with_entries(|entries| {
            let expired = matches!(entries.get(key), Some((_, Some(expires))) if *expires <= Instant::now());
            if expired {
                entries.remove(key);
                return None;
            }
            entries.get(key).map(|(value, _)| value.clone())
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), DomainError> {
        let expires = ttl.map(|t| Instant::now() + t);
        self.with_entries(|entries| {
            entries.insert(key.to_string(), (value.to_string(), expires));
        })
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Some(Duration::from_secs(60))).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let cache = MemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
