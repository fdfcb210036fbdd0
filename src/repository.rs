//! Catalog repository: the single read API consumers use.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::cache::{CacheLayer, CacheResult, CacheSource, CharacterStore};
use crate::catalog::{ApiError, CatalogApi, Character};
use crate::db::{Database, StoreError};
use crate::paging::{
  CharacterPagingSource, CharacterRemoteMediator, Pager, PagingConfig, PagingSnapshot,
  PagingStream, SearchPagingSource,
};

/// Outcome of an id lookup, keeping the reason a character is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterLookup {
  /// Served from the local cache
  Cached(Character),
  /// Not cached, fetched from the network
  Fetched(Character),
  /// The catalog has no character with this id
  NotFound,
  /// The network could not be reached or answered with an error
  Unavailable(ApiError),
}

impl CharacterLookup {
  /// Drop the reason: anything that isn't a character becomes `None`.
  pub fn into_character(self) -> Option<Character> {
    match self {
      CharacterLookup::Cached(c) | CharacterLookup::Fetched(c) => Some(c),
      CharacterLookup::NotFound | CharacterLookup::Unavailable(_) => None,
    }
  }
}

/// Combines the remote client, the local cache and the sync mediator.
pub struct CatalogRepository {
  api: Arc<dyn CatalogApi>,
  db: Database,
  store: CharacterStore,
  cache: CacheLayer,
  config: PagingConfig,
  /// Durable catalog stream, kept alive between consumers
  catalog: Mutex<Option<PagingStream<Character>>>,
}

impl CatalogRepository {
  pub fn new(api: Arc<dyn CatalogApi>, db: Database, config: PagingConfig) -> Self {
    let store = CharacterStore::new(db.clone());
    Self {
      api,
      cache: CacheLayer::new(store.clone()),
      store,
      db,
      config,
      catalog: Mutex::new(None),
    }
  }

  /// Persist characters fetched by id so later lookups hit the cache.
  pub fn with_write_through(mut self, write_through: bool) -> Self {
    self.cache = self.cache.with_write_through(write_through);
    self
  }

  /// Reactive paged view of the catalog.
  ///
  /// A blank or missing filter yields the durable, cache-backed stream; the
  /// repository keeps it running, so later calls resume where the previous
  /// consumer left off. A non-blank filter yields a fresh search stream
  /// straight from the network that lives as long as the returned handle.
  ///
  /// Must be called from within a tokio runtime.
  pub fn characters(&self, name_filter: Option<&str>) -> PagingStream<Character> {
    match name_filter.map(str::trim).filter(|name| !name.is_empty()) {
      Some(name) => self.search_stream(name),
      None => self.catalog_stream(),
    }
  }

  fn catalog_stream(&self) -> PagingStream<Character> {
    self.catalog_stream_started().0
  }

  /// The durable stream, and whether this call started it.
  fn catalog_stream_started(&self) -> (PagingStream<Character>, bool) {
    let mut catalog = self.catalog.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(stream) = catalog.as_ref().filter(|s| !s.is_stopped()) {
      return (stream.clone(), false);
    }

    debug!("starting durable catalog stream");
    let stream = Pager::new(
      self.config,
      Arc::new(CharacterPagingSource::new(self.store.clone())),
    )
    .with_mediator(Arc::new(CharacterRemoteMediator::new(
      Arc::clone(&self.api),
      self.db.clone(),
    )))
    .with_invalidations(self.store.invalidations())
    .start();

    *catalog = Some(stream.clone());
    (stream, true)
  }

  fn search_stream(&self, name: &str) -> PagingStream<Character> {
    debug!(name, "starting search stream");
    Pager::new(
      self.config,
      Arc::new(SearchPagingSource::new(Arc::clone(&self.api), name)),
    )
    .start()
  }

  /// Stop the durable catalog stream. The next `characters(None)` starts a new one.
  pub fn release_catalog(&self) {
    let mut catalog = self.catalog.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(stream) = catalog.take() {
      stream.stop();
    }
  }

  /// Cache-first lookup that keeps the reason for a miss.
  pub async fn lookup_character(&self, id: i64) -> CharacterLookup {
    let api = Arc::clone(&self.api);
    let result = self
      .cache
      .fetch_one(id, || async move {
        api
          .fetch_by_id(id)
          .await
          .map(|dto| dto.into_entity(1))
      })
      .await;

    match result {
      Ok(CacheResult {
        data,
        source: CacheSource::Cache,
      }) => CharacterLookup::Cached(data.into_domain()),
      Ok(CacheResult {
        data,
        source: CacheSource::Network,
      }) => CharacterLookup::Fetched(data.into_domain()),
      Err(e) if e.is_not_found() => CharacterLookup::NotFound,
      Err(e) => {
        info!(id, error = %e, "character unavailable");
        CharacterLookup::Unavailable(e)
      }
    }
  }

  /// Cache-first lookup; every failure degrades to `None`.
  pub async fn character_by_id(&self, id: i64) -> Option<Character> {
    self.lookup_character(id).await.into_character()
  }

  /// Re-fetch the catalog from page 1 through the durable stream.
  ///
  /// Returns the settled snapshot; a failed refresh shows up as
  /// `load_states.refresh = Error` with the previous items kept.
  pub async fn refresh_catalog(&self) -> Option<PagingSnapshot<Character>> {
    let (mut stream, started) = self.catalog_stream_started();
    let snapshot = stream.ready().await?;
    if started && snapshot.remote_refreshes > 0 {
      debug!("initial load already refreshed the catalog");
      return Some(snapshot);
    }
    stream.refresh_settled().await
  }

  /// Wipe every cached character and remote key.
  pub async fn clear_cache(&self) -> Result<(), StoreError> {
    info!("clearing catalog cache");
    self.store.clear_all().await
  }

  pub async fn cached_count(&self) -> Result<u64, StoreError> {
    self.store.count().await
  }
}
