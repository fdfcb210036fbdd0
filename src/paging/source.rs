//! Paging sources: where a pager reads its items from.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::state::{LoadParams, LoadResult, Page};
use crate::cache::CharacterStore;
use crate::catalog::{ApiError, CatalogApi, Character};

/// A keyed, chunked view over some backing data.
#[async_trait]
pub trait PagingSource<T>: Send + Sync {
  async fn load(&self, params: LoadParams) -> LoadResult<T>;
}

/// Reads the cached catalog in id order, keyed by row offset.
pub struct CharacterPagingSource {
  store: CharacterStore,
}

impl CharacterPagingSource {
  pub fn new(store: CharacterStore) -> Self {
    Self { store }
  }
}

#[async_trait]
impl PagingSource<Character> for CharacterPagingSource {
  async fn load(&self, params: LoadParams) -> LoadResult<Character> {
    let offset = params.key.unwrap_or(0);
    match self.store.window(offset, params.load_size).await {
      Ok(rows) => {
        let len = rows.len() as u32;
        LoadResult::Page(Page {
          data: rows.into_iter().map(|r| r.into_domain()).collect(),
          // Forward-only: the window always grows from offset 0
          prev_key: None,
          // A short read means the local table is exhausted
          next_key: if len < params.load_size {
            None
          } else {
            Some(offset + len)
          },
        })
      }
      Err(e) => {
        warn!(offset, error = %e, "failed to read cached window");
        LoadResult::Error(e.to_string())
      }
    }
  }
}

const STARTING_PAGE: u32 = 1;

/// Pages straight from the remote catalog for a name search. Nothing is cached.
pub struct SearchPagingSource {
  api: Arc<dyn CatalogApi>,
  name: String,
}

impl SearchPagingSource {
  pub fn new(api: Arc<dyn CatalogApi>, name: impl Into<String>) -> Self {
    Self {
      api,
      name: name.into(),
    }
  }
}

#[async_trait]
impl PagingSource<Character> for SearchPagingSource {
  async fn load(&self, params: LoadParams) -> LoadResult<Character> {
    let page = params.key.unwrap_or(STARTING_PAGE);

    match self.api.fetch_page(page, Some(&self.name)).await {
      Ok(response) => {
        let next_key = if response.has_next() {
          Some(page + 1)
        } else {
          None
        };
        LoadResult::Page(Page {
          data: response
            .results
            .into_iter()
            .map(|dto| dto.into_domain())
            .collect(),
          prev_key: if page > STARTING_PAGE {
            Some(page - 1)
          } else {
            None
          },
          next_key,
        })
      }
      // The API answers 404 when nothing matches the name
      Err(ApiError::NotFound { .. }) => {
        debug!(name = %self.name, page, "no search results");
        LoadResult::Page(Page::empty())
      }
      Err(e) => LoadResult::Error(e.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::entity;
  use crate::db::Database;
  use crate::testing::FakeCatalog;

  #[tokio::test]
  async fn test_cache_source_offsets() {
    let store = CharacterStore::new(Database::open_in_memory().unwrap());
    store
      .upsert_many((1..=5).map(|i| entity(i, "x", 1)).collect())
      .await
      .unwrap();
    let source = CharacterPagingSource::new(store);

    let first = source
      .load(LoadParams {
        key: None,
        load_size: 3,
      })
      .await;
    let LoadResult::Page(first) = first else {
      panic!("expected page");
    };
    assert_eq!(first.data.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(first.prev_key, None);
    assert_eq!(first.next_key, Some(3));

    let LoadResult::Page(second) = source
      .load(LoadParams {
        key: first.next_key,
        load_size: 3,
      })
      .await
    else {
      panic!("expected page");
    };
    assert_eq!(second.data.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4, 5]);
    assert_eq!(second.prev_key, None);
    assert_eq!(second.next_key, None);
  }

  #[tokio::test]
  async fn test_search_source_keys() {
    let api = Arc::new(FakeCatalog::with_pages(3, 2));
    let source = SearchPagingSource::new(api.clone(), "Rick");

    let LoadResult::Page(first) = source
      .load(LoadParams {
        key: None,
        load_size: 20,
      })
      .await
    else {
      panic!("expected page");
    };
    assert_eq!(first.prev_key, None);
    assert_eq!(first.next_key, Some(2));

    let LoadResult::Page(last) = source
      .load(LoadParams {
        key: Some(3),
        load_size: 20,
      })
      .await
    else {
      panic!("expected page");
    };
    assert_eq!(last.prev_key, Some(2));
    assert_eq!(last.next_key, None);
    assert_eq!(api.page_requests(), vec![(1, Some("Rick".to_string())), (3, Some("Rick".to_string()))]);
  }

  #[tokio::test]
  async fn test_search_not_found_is_empty_terminal_page() {
    let api = Arc::new(FakeCatalog::with_pages(1, 2));
    api.fail_pages_with(ApiError::NotFound {
      message: "There is nothing here".to_string(),
    });
    let source = SearchPagingSource::new(api, "Nobody");

    let result = source
      .load(LoadParams {
        key: None,
        load_size: 20,
      })
      .await;
    assert_eq!(result, LoadResult::Page(Page::empty()));
  }

  #[tokio::test]
  async fn test_search_server_error_is_error() {
    let api = Arc::new(FakeCatalog::with_pages(1, 2));
    api.fail_pages_with(ApiError::Server {
      code: 500,
      message: "boom".to_string(),
    });
    let source = SearchPagingSource::new(api, "Rick");

    let result = source
      .load(LoadParams {
        key: None,
        load_size: 20,
      })
      .await;
    assert!(matches!(result, LoadResult::Error(_)));
  }
}
