//! Ketama-compatible consistent hashing for memcached-style clients.
//!
//! [`Continuum`] maps keys onto a weighted set of servers so that adding or removing a server only
//! remaps a small share of the keys. Building a continuum costs a few hundred MD5 digests per
//! server, so [`Ketama`] keeps built continuums in a [`CacheGateway`] and only rebuilds them when
//! the server definitions change.
//!
//! ```no_run
//! # async fn run() -> Result<(), async_ketama::Error> {
//! use async_ketama::{Ketama, MemoryCache};
//!
//! let mut ketama = Ketama::new(MemoryCache::new());
//! let continuum = ketama.continuum_from_file("/etc/ketama/servers").await?;
//! let server = continuum.server_for("user:42");
//! # Ok(())
//! # }
//! ```
#![deny(warnings, missing_docs)]
use std::path::Path;

use tracing::{debug, warn};

mod cache;
pub use self::cache::{CacheGateway, CacheKeyStrategy, MemcachedCache, MemoryCache};

mod codec;
mod connection;

pub mod definitions;
pub use self::definitions::{parse_definitions, DefinitionReader, FileDefinitions};

mod error;
pub use self::error::Error;

mod parser;
pub use self::parser::{ErrorKind, Status};

mod ring;
pub use self::ring::{hash_for, Continuum, RingPoint};

mod server;
pub use self::server::ServerInfo;

/// Default cache TTL, in seconds.
pub const DEFAULT_TTL: u32 = 3600;

/// Settings for [`Ketama`], fixed at construction.
#[derive(Clone, Debug)]
pub struct Options {
    ttl: u32,
    cache_key: CacheKeyStrategy,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            ttl: DEFAULT_TTL,
            cache_key: CacheKeyStrategy::identity(),
        }
    }
}

impl Options {
    /// Sets how long, in seconds, a built continuum stays in the cache.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the strategy deriving cache keys.
    pub fn cache_key(mut self, cache_key: CacheKeyStrategy) -> Self {
        self.cache_key = cache_key;
        self
    }
}

/// Builds continuums and keeps them in a cache.
///
/// A cached continuum is reused as long as the modification time it was built from matches the
/// current one. Cache failures never fail a call: an unreadable or corrupt entry is rebuilt, and a
/// failed write still returns the freshly built continuum.
pub struct Ketama<C> {
    cache: C,
    options: Options,
}

impl<C: CacheGateway> Ketama<C> {
    /// Creates a new [`Ketama`] with the default [`Options`].
    pub fn new(cache: C) -> Ketama<C> {
        Ketama::with_options(cache, Options::default())
    }

    /// Creates a new [`Ketama`] with the given [`Options`].
    pub fn with_options(cache: C, options: Options) -> Ketama<C> {
        Ketama { cache, options }
    }

    /// Returns a reference to the underlying cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the continuum for the definitions file at `path`.
    ///
    /// The file's modification time decides whether a cached continuum is still fresh.
    pub async fn continuum_from_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<Continuum, Error> {
        let reader = FileDefinitions::new(path);
        let mod_time = reader.modification_time().await?;
        let source_id = reader.path().to_string_lossy().into_owned();

        self.get_continuum(&source_id, mod_time, &reader).await
    }

    /// Returns the continuum for an in-memory list of servers, cached under `source_id`.
    pub async fn continuum_from_servers(
        &mut self,
        servers: &[ServerInfo],
        source_id: &str,
        mod_time: i64,
    ) -> Result<Continuum, Error> {
        self.get_continuum(source_id, mod_time, servers).await
    }

    /// Returns the continuum cached for `source_id` if it was built from `mod_time`, otherwise
    /// builds it from the servers of `reader` and caches it.
    ///
    /// Errors from `reader` and from building the continuum are returned unchanged.
    pub async fn get_continuum<R>(
        &mut self,
        source_id: &str,
        mod_time: i64,
        reader: &R,
    ) -> Result<Continuum, Error>
    where
        R: DefinitionReader + ?Sized,
    {
        let key = self.options.cache_key.key_for(source_id);

        if let Some(continuum) = self.load_from_cache(&key, mod_time).await {
            debug!(%source_id, %key, "continuum cache hit");
            return Ok(continuum);
        }

        let servers = reader.read_servers().await?;
        let continuum = Continuum::build(&servers, mod_time)?;
        debug!(
            %source_id,
            servers = servers.len(),
            points = continuum.len(),
            mod_time,
            "built continuum"
        );

        if let Err(e) = self
            .cache
            .set(&key, &continuum.serialize(), self.options.ttl)
            .await
        {
            warn!(%key, error = %e, "failed to cache continuum");
        }

        Ok(continuum)
    }

    async fn load_from_cache(&mut self, key: &str, mod_time: i64) -> Option<Continuum> {
        let data = match self.cache.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(%key, "continuum cache miss");
                return None;
            }
            Err(e) => {
                warn!(%key, error = %e, "failed to read cached continuum");
                return None;
            }
        };

        match Continuum::deserialize(&data) {
            Ok(continuum) if continuum.built_at() == mod_time => Some(continuum),
            Ok(continuum) => {
                debug!(
                    %key,
                    cached = continuum.built_at(),
                    mod_time,
                    "cached continuum is stale"
                );
                None
            }
            Err(e) => {
                warn!(%key, error = %e, "discarding corrupt cached continuum");
                None
            }
        }
    }
}
