//! Tiered cache: one remote tier (Redis or Upstash) in front of an always-on
//! in-process tier.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::local::LocalStore;
use super::redis::RedisStore;
use super::remote::{CacheTierError, RemoteStore};
use super::upstash::UpstashStore;
use crate::config::CacheConfig;
use crate::metrics;

/// Which store serves as the primary tier, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Redis over TCP
    Redis,
    /// Upstash Redis REST API
    Upstash,
    /// No remote tier; in-process only
    Local,
}

impl CacheTier {
    /// Caller-facing name, reported as `cacheType`.
    pub fn name(&self) -> &'static str {
        match self {
            CacheTier::Redis => "Redis",
            CacheTier::Upstash => "Upstash",
            CacheTier::Local => "In-memory",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, CacheTier::Local)
    }
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialized form held by every tier.
#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    value: T,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }
}

/// Key/value cache with TTL that never fails its caller.
///
/// ## Lookup Order
///
/// 1. Remote tier (if configured). Errors and expired entries count as a miss.
/// 2. In-process tier.
///
/// ## Write Strategy
///
/// Every `set` writes the in-process tier and, when configured, the remote
/// tier. A failed remote write is logged; the local copy still lands.
pub struct TieredCache {
    tier: CacheTier,
    remote: Option<Arc<dyn RemoteStore>>,
    local: LocalStore,
    remote_timeout: Duration,
}

impl TieredCache {
    /// In-process tier only.
    pub fn local_only() -> Self {
        Self {
            tier: CacheTier::Local,
            remote: None,
            local: LocalStore::new(),
            remote_timeout: Duration::from_secs(2),
        }
    }

    /// Bind an explicit remote store as the primary tier.
    pub fn with_remote(tier: CacheTier, store: Arc<dyn RemoteStore>, remote_timeout: Duration) -> Self {
        if !tier.is_remote() {
            return Self::local_only();
        }
        Self {
            tier,
            remote: Some(store),
            local: LocalStore::new(),
            remote_timeout,
        }
    }

    /// Select the primary tier by probing configuration: Redis, then Upstash,
    /// then none. A tier whose client cannot be built is skipped.
    pub fn from_config(config: &CacheConfig) -> Self {
        let timeout = config.remote_timeout();

        if let Some(url) = config.redis.connection_url() {
            match RedisStore::connect(&url, config.redis.pool_size, timeout) {
                Ok(store) => {
                    tracing::info!(pool_size = config.redis.pool_size, "Using Redis cache tier (TCP)");
                    return Self::with_remote(CacheTier::Redis, Arc::new(store), timeout);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis configured but unusable, trying next tier");
                }
            }
        }

        if let Some((rest_url, token)) = config.upstash.credentials() {
            match UpstashStore::new(rest_url, token, timeout) {
                Ok(store) => {
                    tracing::info!("Using Upstash cache tier (REST API)");
                    return Self::with_remote(CacheTier::Upstash, Arc::new(store), timeout);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstash configured but unusable, trying next tier");
                }
            }
        }

        tracing::info!("Using in-memory cache (no remote tier configured)");
        Self::local_only()
    }

    /// The tier selected at construction.
    pub fn active_tier(&self) -> CacheTier {
        self.tier
    }

    pub fn is_remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    /// Get a value, or `None` if absent or expired in every tier.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(remote) = &self.remote {
            match self.remote_get::<T>(remote.as_ref(), key).await {
                Ok(Some(value)) => {
                    tracing::debug!(key = %key, tier = %self.tier, "cache hit (remote)");
                    metrics::record_cache_hit(self.tier.name());
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, tier = %self.tier, error = %e, "cache GET error, falling back to in-memory");
                    metrics::record_cache_tier_error(self.tier.name(), "get");
                }
            }
        }

        let Some(payload) = self.local.get(key, now_millis()) else {
            tracing::debug!(key = %key, "cache miss");
            metrics::record_cache_miss();
            return None;
        };
        match serde_json::from_str::<CacheEntry<T>>(&payload) {
            Ok(entry) => {
                tracing::debug!(key = %key, "cache hit (in-memory)");
                metrics::record_cache_hit(CacheTier::Local.name());
                Some(entry.value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "in-memory entry has unexpected shape");
                metrics::record_cache_miss();
                None
            }
        }
    }

    /// Store a value in every tier with the given TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let expires_at = now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        let payload = match serde_json::to_string(&CacheEntry { value, expires_at }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to serialize cache entry");
                return;
            }
        };

        if let Some(remote) = &self.remote {
            let ttl_secs = ttl.as_secs().max(1);
            match self.bounded(remote.set_ex(key, &payload, ttl_secs)).await {
                Ok(()) => {
                    tracing::debug!(key = %key, tier = %self.tier, ttl_secs, "cache set (remote)");
                }
                Err(e) => {
                    tracing::warn!(key = %key, tier = %self.tier, error = %e, "cache SET error, keeping in-memory copy");
                    metrics::record_cache_tier_error(self.tier.name(), "set");
                }
            }
        }

        self.local.insert(key, payload, expires_at);
    }

    /// Best-effort removal from every tier.
    pub async fn delete(&self, key: &str) {
        if let Some(remote) = &self.remote {
            if let Err(e) = self.bounded(remote.del(key)).await {
                tracing::warn!(key = %key, tier = %self.tier, error = %e, "cache DEL error");
                metrics::record_cache_tier_error(self.tier.name(), "del");
            }
        }
        self.local.remove(key);
        tracing::debug!(key = %key, "cache entry deleted");
    }

    /// Drop every in-process entry. Remote tiers are left alone.
    pub fn clear_local(&self) {
        if self.remote.is_some() {
            tracing::warn!(tier = %self.tier, "clearing in-memory tier only; remote entries expire by TTL");
        }
        self.local.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tier: self.tier.name(),
            remote_configured: self.remote.is_some(),
            local_entries: self.local.len(),
        }
    }

    async fn remote_get<T: DeserializeOwned>(
        &self,
        remote: &dyn RemoteStore,
        key: &str,
    ) -> Result<Option<T>, CacheTierError> {
        let Some(raw) = self.bounded(remote.get(key)).await? else {
            return Ok(None);
        };
        let entry: CacheEntry<T> =
            serde_json::from_str(&raw).map_err(|e| CacheTierError::Decode(e.to_string()))?;

        if entry.is_expired(now_millis()) {
            tracing::debug!(key = %key, tier = %self.tier, "expired remote entry, purging");
            if let Err(e) = self.bounded(remote.del(key)).await {
                tracing::warn!(key = %key, tier = %self.tier, error = %e, "failed to purge expired entry");
            }
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn bounded<F, R>(&self, call: F) -> Result<R, CacheTierError>
    where
        F: Future<Output = Result<R, CacheTierError>>,
    {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .map_err(|_| CacheTierError::Timeout(self.remote_timeout))?
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tier: &'static str,
    pub remote_configured: bool,
    pub local_entries: usize,
}

fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
