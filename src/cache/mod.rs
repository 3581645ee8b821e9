//! Caches used to keep built continuums between calls.
//!
//! A cache is an optimization, never a source of truth: [`Ketama`](crate::Ketama) treats failed
//! reads as misses and ignores failed writes.
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use md5::{Digest, Md5};

use crate::error::Error;

mod memcached;
pub use self::memcached::MemcachedCache;

mod memory;
pub use self::memory::MemoryCache;

const KEY_PREFIX: &str = "continuum.";

/// A key/value store with expiry.
pub trait CacheGateway {
    /// Gets the value stored under `key`, if any.
    fn get(&mut self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>>;

    /// Stores `value` under `key` for `ttl` seconds.
    fn set(&mut self, key: &str, value: &[u8], ttl: u32) -> impl Future<Output = Result<(), Error>>;
}

/// Maps the namespaced key of a continuum onto the key actually used in the cache.
///
/// The default strategy is the identity. Supplying a prefixing strategy lets several independent
/// users share one cache backend.
#[derive(Clone)]
pub struct CacheKeyStrategy(Option<Arc<dyn Fn(&str) -> String + Send + Sync>>);

impl CacheKeyStrategy {
    /// Uses the namespaced key as is.
    pub fn identity() -> CacheKeyStrategy {
        CacheKeyStrategy(None)
    }

    /// Derives storage keys with `f`.
    pub fn new<F>(f: F) -> CacheKeyStrategy
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        CacheKeyStrategy(Some(Arc::new(f)))
    }

    /// Applies the strategy to a raw key.
    pub fn apply(&self, key: &str) -> String {
        match &self.0 {
            Some(f) => f(key),
            None => key.to_string(),
        }
    }

    /// The storage key for the continuum of `source_id`: the strategy applied to
    /// `continuum.<hex md5 of source_id>`.
    pub fn key_for(&self, source_id: &str) -> String {
        let digest = Md5::digest(source_id.as_bytes());
        self.apply(&format!("{}{:x}", KEY_PREFIX, digest))
    }
}

impl Default for CacheKeyStrategy {
    fn default() -> Self {
        CacheKeyStrategy::identity()
    }
}

impl fmt::Debug for CacheKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(_) => write!(f, "CacheKeyStrategy(custom)"),
            None => write!(f, "CacheKeyStrategy(identity)"),
        }
    }
}
