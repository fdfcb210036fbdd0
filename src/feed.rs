//! Presentation-facing feed: a search query mapped to the stream it selects.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::Character;
use crate::paging::PagingStream;
use crate::query::Query;
use crate::repository::{CatalogRepository, CharacterLookup};

fn normalize(query: &str) -> Option<String> {
  Some(query.trim())
    .filter(|q| !q.is_empty())
    .map(String::from)
}

/// Detail lookup for one character.
///
/// An unknown id settles as `Success(None)`; an unreachable catalog as `Error`.
pub fn character_detail(repository: Arc<CatalogRepository>, id: i64) -> Query<Option<Character>> {
  Query::new(move || {
    let repository = Arc::clone(&repository);
    async move {
      match repository.lookup_character(id).await {
        CharacterLookup::Cached(c) | CharacterLookup::Fetched(c) => Ok(Some(c)),
        CharacterLookup::NotFound => Ok(None),
        CharacterLookup::Unavailable(e) => Err(e.to_string()),
      }
    }
  })
}

/// Holds the current query and the stream it selects.
///
/// Changing the query cancels the previous search stream. The durable
/// catalog stream is owned by the repository and keeps running.
pub struct CharacterFeed {
  repository: Arc<CatalogRepository>,
  query: Option<String>,
  stream: PagingStream<Character>,
}

impl CharacterFeed {
  /// Start on the unfiltered catalog. Must be called inside a tokio runtime.
  pub fn new(repository: Arc<CatalogRepository>) -> Self {
    Self::with_query(repository, "")
  }

  /// Start on `query`; only the stream it selects is opened.
  pub fn with_query(repository: Arc<CatalogRepository>, query: &str) -> Self {
    let query = normalize(query);
    let stream = repository.characters(query.as_deref());
    Self {
      repository,
      query,
      stream,
    }
  }

  pub fn query(&self) -> Option<&str> {
    self.query.as_deref()
  }

  /// Switch to `query`. Blank means the unfiltered catalog.
  ///
  /// Returns `false` when the normalized query is unchanged.
  pub fn set_query(&mut self, query: &str) -> bool {
    let query = normalize(query);
    if query == self.query {
      return false;
    }

    debug!(from = ?self.query, to = ?query, "switching feed query");
    if self.query.is_some() {
      self.stream.stop();
    }
    self.stream = self.repository.characters(query.as_deref());
    self.query = query;
    true
  }

  pub fn stream(&self) -> &PagingStream<Character> {
    &self.stream
  }

  pub fn stream_mut(&mut self) -> &mut PagingStream<Character> {
    &mut self.stream
  }

  pub fn detail(&self, id: i64) -> Query<Option<Character>> {
    character_detail(Arc::clone(&self.repository), id)
  }
}
