use mgnrega_core::{DEFAULT_LIMIT, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// data.gov.in resource access
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Tiered cache (Redis, Upstash REST, in-process)
    #[serde(default)]
    pub cache: CacheConfig,
    /// Query defaults and limits
    #[serde(default)]
    pub query: QuerySettings,
    /// Snapshot reconciliation
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err("upstream.base_url must not be empty".into());
        }
        if self.upstream.timeout_ms == 0 {
            return Err("upstream.timeout_ms must be > 0".into());
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be > 0".into());
        }
        if self.cache.remote_timeout_ms == 0 {
            return Err("cache.remote_timeout_ms must be > 0".into());
        }
        if self.cache.redis.pool_size == 0 {
            return Err("cache.redis.pool_size must be > 0".into());
        }
        if self.query.default_limit == 0 || self.query.max_limit == 0 {
            return Err("query limits must be > 0".into());
        }
        if self.query.default_limit > self.query.max_limit {
            return Err("query.default_limit must be <= query.max_limit".into());
        }
        if self.query.max_pages == 0 {
            return Err("query.max_pages must be > 0".into());
        }
        if !self.reconcile.weights.is_valid() {
            return Err("reconcile.weights must be finite and non-negative".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Upstream data.gov.in configuration.
///
/// `resource_id` and `api_key` are optional here on purpose: the server starts
/// without them and answers every uncached query with a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_upstream_base_url() -> String {
    "https://api.data.gov.in".into()
}
fn default_upstream_timeout_ms() -> u64 {
    15_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            resource_id: None,
            api_key: None,
            timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds (default: 24 hours)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Bound on every remote tier call, in milliseconds
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    /// Preferred remote tier
    #[serde(default)]
    pub redis: RedisConfig,
    /// Secondary remote tier
    #[serde(default)]
    pub upstash: UpstashConfig,
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_remote_timeout_ms() -> u64 {
    2_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            remote_timeout_ms: default_remote_timeout_ms(),
            redis: RedisConfig::default(),
            upstash: UpstashConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

/// Redis over TCP. Either `url` or `host` selects this tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Full connection URL (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_pool_size() -> usize {
    10
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_redis_port(),
            password: None,
            pool_size: default_redis_pool_size(),
        }
    }
}

impl RedisConfig {
    /// Connection URL, preferring `url` over discrete host settings.
    pub fn connection_url(&self) -> Option<String> {
        if let Some(url) = non_empty(self.url.as_deref()) {
            return Some(url.to_string());
        }
        let host = non_empty(self.host.as_deref())?;
        Some(match non_empty(self.password.as_deref()) {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                urlencoding::encode(password),
                host,
                self.port
            ),
            None => format!("redis://{}:{}", host, self.port),
        })
    }
}

/// Upstash Redis REST API.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstashConfig {
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub rest_token: Option<String>,
}

impl UpstashConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(self.rest_url.as_deref())?,
            non_empty(self.rest_token.as_deref())?,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Region used when the caller omits one
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    /// Upper bound on pages walked by a fetch-all query
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_region() -> String {
    "Bihar".into()
}
fn default_limit() -> u32 {
    DEFAULT_LIMIT
}
fn default_max_limit() -> u32 {
    1000
}
fn default_max_pages() -> u32 {
    50
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconcileSettings {
    #[serde(default)]
    pub weights: ScoreWeights,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("mgnrega.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Structured overrides, e.g., MGNREGA__CACHE__TTL_SECS=3600
        builder = builder.add_source(
            Environment::with_prefix("MGNREGA")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        apply_legacy_env(&mut merged, |name| std::env::var(name).ok());
        merged.validate()?;
        Ok(merged)
    }

    /// Flat variables of the legacy deployment. They are applied last and
    /// win over file and structured values. Empty values are ignored.
    pub fn apply_legacy_env<F>(cfg: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(v) = first(&["MGNREGA_RESOURCE_ID", "RESOURCE_ID"]) {
            cfg.upstream.resource_id = Some(v);
        }
        if let Some(v) = first(&["DATA_GOV_API_KEY", "DATA_API_KEY"]) {
            cfg.upstream.api_key = Some(v);
        }
        if let Some(v) = first(&["REDIS_URL"]) {
            cfg.cache.redis.url = Some(v);
        }
        if let Some(v) = first(&["REDIS_HOST"]) {
            cfg.cache.redis.host = Some(v);
        }
        if let Some(port) = first(&["REDIS_PORT"]).and_then(|v| v.trim().parse().ok()) {
            cfg.cache.redis.port = port;
        }
        if let Some(v) = first(&["REDIS_PASSWORD"]) {
            cfg.cache.redis.password = Some(v);
        }
        if let Some(v) = first(&["UPSTASH_REDIS_REST_URL"]) {
            cfg.cache.upstash.rest_url = Some(v);
        }
        if let Some(v) = first(&["UPSTASH_REDIS_REST_TOKEN"]) {
            cfg.cache.upstash.rest_token = Some(v);
        }
        if let Some(v) = first(&["DEFAULT_STATE", "NEXT_PUBLIC_DEFAULT_STATE"]) {
            cfg.query.default_region = v;
        }
    }
}
