//! Sync mediator: fills the local cache from the remote catalog on demand.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::state::{InitializeAction, LoadType, PagingState};
use crate::cache::{
  CharacterDao, CharacterEntity, CharacterStore, RemoteKey, RemoteKeyDao, RemoteKeyLedger,
};
use crate::catalog::{ApiError, CatalogApi, Character};
use crate::db::{Database, StoreError};

/// Failure of a mediator load. The cause is carried, never interpreted.
#[derive(Debug, Error)]
pub enum MediatorError {
  #[error("fetch failed: {0}")]
  Fetch(#[from] ApiError),

  #[error("cache write failed: {0}")]
  Store(#[from] StoreError),
}

#[derive(Debug)]
pub enum MediatorResult {
  Success { end_of_pagination_reached: bool },
  Error(MediatorError),
}

impl MediatorResult {
  pub fn end_reached() -> Self {
    MediatorResult::Success {
      end_of_pagination_reached: true,
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, MediatorResult::Success { .. })
  }

  pub fn end_of_pagination_reached(&self) -> bool {
    matches!(
      self,
      MediatorResult::Success {
        end_of_pagination_reached: true
      }
    )
  }
}

/// Decides how a pager's local source gets refilled from the network.
#[async_trait]
pub trait RemoteMediator<T>: Send + Sync {
  /// Called once before the first load of a stream.
  async fn initialize(&self) -> InitializeAction {
    InitializeAction::LaunchInitialRefresh
  }

  async fn load(&self, load_type: LoadType, state: &PagingState<T>) -> MediatorResult;
}

/// Mediator for the durable character catalog.
///
/// It is the only writer of the character and remote key tables while
/// paginating; every successful fetch is committed in a single transaction.
pub struct CharacterRemoteMediator {
  api: Arc<dyn CatalogApi>,
  db: Database,
  characters: CharacterStore,
  keys: RemoteKeyLedger,
}

impl CharacterRemoteMediator {
  pub fn new(api: Arc<dyn CatalogApi>, db: Database) -> Self {
    Self {
      api,
      characters: CharacterStore::new(db.clone()),
      keys: RemoteKeyLedger::new(db.clone()),
      db,
    }
  }

  /// Page to fetch for an append, or `None` when pagination is complete.
  async fn append_page(&self, state: &PagingState<Character>) -> Result<Option<u32>, StoreError> {
    let last_id = match state.last_item() {
      Some(item) => Some(item.id),
      // Nothing in memory yet; fall back to the highest cached id
      None => self.characters.get_last().await?.map(|e| e.id),
    };

    let Some(last_id) = last_id else {
      debug!("append with no items anywhere, pagination complete");
      return Ok(None);
    };

    let key = match self.keys.get(last_id).await? {
      Some(key) => Some(key),
      // Cached by an id lookup; continue from the last character a page produced
      None => self.keys.last_at_or_below(last_id).await?,
    };
    let next = key.and_then(|k| k.next_page);
    debug!(last_id, ?next, "resolved append key");
    Ok(next)
  }

  /// Fetch `page` and commit it. Returns whether the end of pagination was reached.
  async fn fetch_and_commit(&self, page: u32, refresh: bool) -> Result<bool, MediatorError> {
    let response = self.api.fetch_page(page, None).await?;
    let end_of_pagination = !response.has_next();

    let rows: Vec<CharacterEntity> = response
      .results
      .into_iter()
      .map(|dto| dto.into_entity(page))
      .collect();
    let keys: Vec<RemoteKey> = rows
      .iter()
      .map(|row| RemoteKey::for_page(row.id, page, end_of_pagination))
      .collect();
    let count = rows.len();

    self
      .db
      .write(move |tx| {
        if refresh {
          RemoteKeyDao::clear_all(tx)?;
          CharacterDao::clear_all(tx)?;
        }
        RemoteKeyDao::upsert_many(tx, &keys)?;
        CharacterDao::upsert_many(tx, &rows)?;
        Ok(())
      })
      .await?;

    info!(page, count, refresh, end_of_pagination, "committed catalog page");
    Ok(end_of_pagination)
  }
}

#[async_trait]
impl RemoteMediator<Character> for CharacterRemoteMediator {
  async fn initialize(&self) -> InitializeAction {
    match self.characters.count().await {
      Ok(0) => InitializeAction::LaunchInitialRefresh,
      Ok(count) => {
        debug!(count, "cache populated, skipping initial refresh");
        InitializeAction::SkipInitialRefresh
      }
      Err(e) => {
        warn!(error = %e, "failed to check cache, launching refresh");
        InitializeAction::LaunchInitialRefresh
      }
    }
  }

  async fn load(&self, load_type: LoadType, state: &PagingState<Character>) -> MediatorResult {
    let page = match load_type {
      LoadType::Refresh => 1,
      // Forward-only catalog: nothing is ever loaded before the first page
      LoadType::Prepend => return MediatorResult::end_reached(),
      LoadType::Append => match self.append_page(state).await {
        Ok(Some(page)) => page,
        Ok(None) => return MediatorResult::end_reached(),
        Err(e) => return MediatorResult::Error(e.into()),
      },
    };

    match self
      .fetch_and_commit(page, load_type == LoadType::Refresh)
      .await
    {
      Ok(end_of_pagination_reached) => MediatorResult::Success {
        end_of_pagination_reached,
      },
      Err(e) => {
        warn!(page, ?load_type, error = %e, "mediator load failed");
        MediatorResult::Error(e)
      }
    }
  }
}
