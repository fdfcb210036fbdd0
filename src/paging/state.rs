//! Value types shared by paging sources, the mediator and the pager.

use std::sync::Arc;

/// Which end of the window a load targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
  /// Reset to the first page
  Refresh,
  /// Load before the first loaded item
  Prepend,
  /// Load after the last loaded item
  Append,
}

/// Decision taken by a mediator before the first load of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeAction {
  LaunchInitialRefresh,
  SkipInitialRefresh,
}

/// Sizing knobs for a pager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
  pub page_size: u32,
  pub initial_load_size: u32,
}

impl PagingConfig {
  pub fn new(page_size: u32) -> Self {
    let page_size = page_size.max(1);
    Self {
      page_size,
      initial_load_size: page_size * 3,
    }
  }

  pub fn with_initial_load_size(mut self, initial_load_size: u32) -> Self {
    self.initial_load_size = initial_load_size.max(self.page_size);
    self
  }
}

impl Default for PagingConfig {
  fn default() -> Self {
    Self::new(20)
  }
}

/// Parameters of one paging source load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadParams {
  /// Source-specific key; `None` means "start from the beginning"
  pub key: Option<u32>,
  pub load_size: u32,
}

/// One loaded chunk of items with keys for its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
  pub data: Vec<T>,
  pub prev_key: Option<u32>,
  pub next_key: Option<u32>,
}

impl<T> Page<T> {
  pub fn empty() -> Self {
    Self {
      data: Vec::new(),
      prev_key: None,
      next_key: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult<T> {
  Page(Page<T>),
  Error(String),
}

/// Pages currently held by a pager, handed to the mediator on each load.
#[derive(Debug, Clone)]
pub struct PagingState<T> {
  pub pages: Vec<Page<T>>,
  pub config: PagingConfig,
}

impl<T> PagingState<T> {
  pub fn new(pages: Vec<Page<T>>, config: PagingConfig) -> Self {
    Self { pages, config }
  }

  pub fn empty(config: PagingConfig) -> Self {
    Self::new(Vec::new(), config)
  }

  /// Last item of the last non-empty page.
  pub fn last_item(&self) -> Option<&T> {
    self.pages.iter().rev().find_map(|p| p.data.last())
  }
}

/// Status of one load direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
  NotLoading { end_of_pagination_reached: bool },
  Loading,
  Error(String),
}

impl LoadState {
  pub fn idle() -> Self {
    LoadState::NotLoading {
      end_of_pagination_reached: false,
    }
  }

  pub fn complete() -> Self {
    LoadState::NotLoading {
      end_of_pagination_reached: true,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, LoadState::Error(_))
  }

  pub fn end_of_pagination_reached(&self) -> bool {
    matches!(
      self,
      LoadState::NotLoading {
        end_of_pagination_reached: true
      }
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStates {
  pub refresh: LoadState,
  pub prepend: LoadState,
  pub append: LoadState,
}

impl Default for LoadStates {
  fn default() -> Self {
    Self {
      refresh: LoadState::idle(),
      prepend: LoadState::complete(),
      append: LoadState::idle(),
    }
  }
}

/// What observers of a paging stream see.
///
/// `generation` increases by one with every published snapshot.
#[derive(Debug, Clone)]
pub struct PagingSnapshot<T> {
  pub items: Arc<Vec<T>>,
  pub load_states: LoadStates,
  /// Mediator refreshes this stream has run, the initial one included
  pub remote_refreshes: u64,
  pub generation: u64,
}

impl<T> PagingSnapshot<T> {
  pub fn initial() -> Self {
    Self {
      items: Arc::new(Vec::new()),
      load_states: LoadStates {
        refresh: LoadState::Loading,
        ..LoadStates::default()
      },
      remote_refreshes: 0,
      generation: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn page(data: Vec<i32>) -> Page<i32> {
    Page {
      data,
      prev_key: None,
      next_key: None,
    }
  }

  #[test]
  fn test_last_item_skips_empty_pages() {
    let state = PagingState::new(
      vec![page(vec![1, 2]), page(vec![3]), page(vec![])],
      PagingConfig::default(),
    );
    assert_eq!(state.last_item(), Some(&3));
  }

  #[test]
  fn test_empty_state_has_no_last_item() {
    let state: PagingState<i32> = PagingState::empty(PagingConfig::default());
    assert_eq!(state.last_item(), None);
  }

  #[test]
  fn test_config_defaults() {
    let config = PagingConfig::default();
    assert_eq!(config.page_size, 20);
    assert_eq!(config.initial_load_size, 60);
    assert_eq!(PagingConfig::new(0).page_size, 1);
    assert_eq!(PagingConfig::new(10).with_initial_load_size(5).initial_load_size, 10);
  }
}
