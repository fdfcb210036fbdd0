//! One-shot async lookups with observable state.
//!
//! A `Query<T>` wraps a fetch closure and tracks whether it is idle, in
//! flight, done or failed. The fetch runs on its own task; `settle()` waits
//! for it.
//!
//! # Example
//!
//! ```ignore
//! let mut detail = character_detail(repository.clone(), 1);
//! detail.fetch();
//! match detail.settle().await {
//!   QueryState::Success(Some(character)) => println!("{}", character.name),
//!   QueryState::Success(None) => println!("no such character"),
//!   QueryState::Error(e) => eprintln!("{}", e),
//!   QueryState::Idle | QueryState::Loading => {}
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
  /// Not started
  Idle,
  /// Fetch in flight
  Loading,
  Success(T),
  Error(String),
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  pending: Option<oneshot::Receiver<Result<T, String>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query around `fetcher`, invoked on every `fetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      pending: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Start fetching unless a fetch is already in flight.
  ///
  /// Must be called from within a tokio runtime.
  pub fn fetch(&mut self) {
    if matches!(self.state, QueryState::Loading) {
      return;
    }

    let (tx, rx) = oneshot::channel();
    self.pending = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // Receiver is gone if the query was dropped
      let _ = tx.send(future.await);
    });
  }

  /// Wait for the pending fetch, if any, and return the resulting state.
  pub async fn settle(&mut self) -> &QueryState<T> {
    if let Some(pending) = self.pending.take() {
      self.state = match pending.await {
        Ok(Ok(data)) => QueryState::Success(data),
        Ok(Err(error)) => QueryState::Error(error),
        Err(_) => QueryState::Error("Query was cancelled".to_string()),
      };
    }
    &self.state
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_settle_returns_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(Some("Rick Sanchez")) });
    assert_eq!(query.state(), &QueryState::Idle);

    query.fetch();
    assert_eq!(query.state(), &QueryState::Loading);
    assert_eq!(query.settle().await, &QueryState::Success(Some("Rick Sanchez")));
  }

  #[tokio::test]
  async fn test_settle_waits_for_error() {
    let mut query: Query<u32> = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Err("catalog unreachable".to_string())
    });

    query.fetch();
    assert_eq!(
      query.settle().await,
      &QueryState::Error("catalog unreachable".to_string())
    );
  }

  #[tokio::test]
  async fn test_settle_without_fetch_is_idle() {
    let mut query = Query::new(|| async { Ok::<_, String>(1) });
    assert_eq!(query.settle().await, &QueryState::Idle);
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut query = Query::new(move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, String>(n)
      }
    });

    query.fetch();
    query.fetch();
    assert_eq!(query.settle().await, &QueryState::Success(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Settled queries can fetch again
    query.fetch();
    assert_eq!(query.settle().await, &QueryState::Success(1));
  }
}
