use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::CacheGateway;
use crate::error::Error;

/// An in-process cache with per-entry expiry.
///
/// A `ttl` of zero stores the entry without expiry. Expired entries are dropped when read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, (Vec<u8>, Option<Instant>)>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheGateway for MemoryCache {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some((_, Some(expires_at))) => Instant::now() >= *expires_at,
            Some((_, None)) => false,
        };

        if expired {
            self.entries.remove(key);
            return Ok(None);
        }

        Ok(self.entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&mut self, key: &str, value: &[u8], ttl: u32) -> Result<(), Error> {
        let expires_at = (ttl > 0).then(|| Instant::now() + Duration::from_secs(u64::from(ttl)));
        self.entries
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }
}
