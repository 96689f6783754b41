use crate::domain::error::DomainError;
use crate::domain::ports::cache::KeyValueCache;
use redis::AsyncCommands;
use std::time::Duration;

/// Redis-backed cache, shared across processes.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self, DomainError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| DomainError::Config(format!("invalid redis url: {e}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, DomainError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DomainError::Network(format!("redis connect: {e}")))
    }
}

#[async_trait::async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| DomainError::Network(format!("redis GET {key}: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), DomainError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| DomainError::Network(format!("redis SET {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| DomainError::Network(format!("redis DEL {key}: {e}")))
    }
}
