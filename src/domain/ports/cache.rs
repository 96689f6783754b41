use crate::domain::error::DomainError;
use std::time::Duration;

/// Shared string cache. Backed by Redis in production and by memory in tests.
#[async_trait::async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), DomainError>;
    async fn delete(&self, key: &str) -> Result<(), DomainError>;
}
