//! Redis over TCP (preferred remote tier).

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use ::redis::AsyncCommands;
use std::time::Duration;

use super::remote::{CacheTierError, RemoteStore};

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Build a pool for `url`. No connection is opened here; an unreachable
    /// server shows up later as per-call errors.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> Result<Self, CacheTierError> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheTierError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheTierError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheTierError::Connection(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheTierError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheTierError::Command(e.to_string()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheTierError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheTierError::Command(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), CacheTierError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheTierError::Command(e.to_string()))
    }
}
