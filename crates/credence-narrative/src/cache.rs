//! Optional TTL cache for generated narratives.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Key-value cache with per-entry expiry.
///
/// Implementations must be best-effort: a cache miss or a backend error is
/// indistinguishable to the caller, who then asks the endpoint.
#[async_trait]
pub trait NarrativeCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// In-process cache backed by a `HashMap<key, (value, expiry)>`.
#[derive(Debug, Default)]
pub struct MemoryNarrativeCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryNarrativeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NarrativeCache for MemoryNarrativeCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value, now + ttl));
    }
}
