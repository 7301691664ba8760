//! Tiered cache for upstream query results.
//!
//! ## Tiers
//!
//! - **Redis (TCP)**: preferred remote tier, shared across instances
//! - **Upstash (REST)**: secondary remote tier for environments without TCP egress
//! - **In-memory (DashMap)**: always active, per instance
//!
//! ```text
//! get → remote tier (if any) → in-memory → miss
//! set → remote tier (if any) + in-memory
//! ```
//!
//! ## Graceful Degradation
//!
//! Remote errors and timeouts are logged and treated as misses. The cache
//! never fails its caller.

pub mod backend;
pub mod local;
pub mod redis;
pub mod remote;
pub mod upstash;

pub use backend::{CacheStats, CacheTier, TieredCache};
pub use local::LocalStore;
pub use redis::RedisStore;
pub use remote::{CacheTierError, RemoteStore};
pub use upstash::UpstashStore;
