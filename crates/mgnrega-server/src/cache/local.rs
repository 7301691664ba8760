//! In-process tier.

use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct LocalEntry {
    payload: Arc<str>,
    expires_at: i64,
}

/// Concurrent in-memory store with lazy expiry.
///
/// Entries are only dropped when read after `expires_at` or overwritten;
/// there is no background reaper.
#[derive(Clone, Debug, Default)]
pub struct LocalStore {
    entries: Arc<DashMap<String, LocalEntry>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload for `key` unless it expired before `now_ms`.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<Arc<str>> {
        if let Some(entry) = self.entries.get(key) {
            if now_ms <= entry.expires_at {
                return Some(Arc::clone(&entry.payload));
            }
        } else {
            return None;
        }
        // Only purge if nobody refreshed the entry meanwhile.
        self.entries.remove_if(key, |_, entry| now_ms > entry.expires_at);
        None
    }

    pub fn insert(&self, key: &str, payload: String, expires_at: i64) {
        self.entries.insert(
            key.to_string(),
            LocalEntry {
                payload: Arc::from(payload),
                expires_at,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
