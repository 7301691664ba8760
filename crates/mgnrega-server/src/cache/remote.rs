//! Remote tier abstraction.

use async_trait::async_trait;
use std::time::Duration;

/// Failure of a single cache tier. Never leaves [`super::TieredCache`].
#[derive(Debug, thiserror::Error)]
pub enum CacheTierError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode cached payload: {0}")]
    Decode(String),
}

/// A key/value store reachable over the network.
///
/// Values are opaque strings (the serialized cache envelope); expiry is
/// enforced both by the store's own TTL and by the envelope's `expiresAt`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheTierError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheTierError>;

    async fn del(&self, key: &str) -> Result<(), CacheTierError>;
}
