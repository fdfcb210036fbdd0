//! Cache layer for single-character lookups.

use std::future::Future;

use tracing::{debug, warn};

use super::characters::{CharacterEntity, CharacterStore};
use super::traits::CacheResult;

/// Cache-first lookup with network fallback.
///
/// This layer sits between the repository and the network client for
/// point lookups. List pagination goes through the sync mediator instead.
#[derive(Clone)]
pub struct CacheLayer {
  store: CharacterStore,
  /// Persist network-fetched rows so later lookups hit the cache
  write_through: bool,
}

impl CacheLayer {
  pub fn new(store: CharacterStore) -> Self {
    Self {
      store,
      write_through: false,
    }
  }

  pub fn with_write_through(mut self, write_through: bool) -> Self {
    self.write_through = write_through;
    self
  }

  /// Fetch a single entity with cache-first strategy.
  ///
  /// 1. Check cache - on hit, return without calling the fetcher
  /// 2. On miss or cache failure, fetch from network
  /// 3. Optionally write the fetched row through to the cache
  ///
  /// Fetch errors are returned untouched; a failed write-through is only logged.
  pub async fn fetch_one<E, F, Fut>(&self, id: i64, fetcher: F) -> Result<CacheResult<CharacterEntity>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<CharacterEntity, E>>,
  {
    match self.store.get_by_id(id).await {
      Ok(Some(cached)) => return Ok(CacheResult::from_cache(cached)),
      Ok(None) => debug!(id, "cache miss"),
      Err(e) => warn!(id, error = %e, "cache lookup failed, falling back to network"),
    }

    let fetched = fetcher().await?;

    if self.write_through {
      if let Err(e) = self.store.upsert_one(fetched.clone()).await {
        warn!(id, error = %e, "failed to write fetched character to cache");
      }
    }

    Ok(CacheResult::from_network(fetched))
  }
}
