pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod server;
pub mod upstream;

pub use aggregator::{AggregateResult, Aggregator, Provenance};
pub use cache::{CacheStats, CacheTier, RemoteStore, TieredCache};
pub use config::{AppConfig, CacheConfig, QuerySettings, RedisConfig, UpstashConfig, UpstreamConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, MgnregaServer, ServerBuilder, build_app, build_router, build_state};
pub use upstream::{UpstreamClient, UpstreamError, UpstreamPage};
