//! Pager: drives loads for one stream and publishes snapshots to observers.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::mediator::{MediatorResult, RemoteMediator};
use super::source::PagingSource;
use super::state::{
  InitializeAction, LoadParams, LoadResult, LoadState, LoadStates, LoadType, Page, PagingConfig,
  PagingSnapshot, PagingState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagerCommand {
  Append,
  Refresh,
  Retry,
}

/// Builder for one paging stream.
///
/// Without a mediator the source is the only data origin (e.g. a remote
/// search). With a mediator the source is the local cache and the mediator
/// refills it when the local data runs out or on refresh.
pub struct Pager<T> {
  config: PagingConfig,
  source: Arc<dyn PagingSource<T>>,
  mediator: Option<Arc<dyn RemoteMediator<T>>>,
  invalidations: Option<watch::Receiver<u64>>,
}

impl<T> Pager<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new(config: PagingConfig, source: Arc<dyn PagingSource<T>>) -> Self {
    Self {
      config,
      source,
      mediator: None,
      invalidations: None,
    }
  }

  pub fn with_mediator(mut self, mediator: Arc<dyn RemoteMediator<T>>) -> Self {
    self.mediator = Some(mediator);
    self
  }

  /// Re-read the window whenever the backing store commits a write.
  ///
  /// Only meaningful for sources that can be re-read from the start cheaply,
  /// such as the local cache.
  pub fn with_invalidations(mut self, invalidations: watch::Receiver<u64>) -> Self {
    self.invalidations = Some(invalidations);
    self
  }

  /// Spawn the stream task and return a handle to it.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(self) -> PagingStream<T> {
    let (snapshot_tx, snapshot_rx) = watch::channel(PagingSnapshot::initial());
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let task = PagerTask {
      config: self.config,
      source: self.source,
      mediator: self.mediator,
      pages: Vec::new(),
      load_states: LoadStates::default(),
      remote_end_reached: false,
      last_failed: None,
      remote_refreshes: 0,
      generation: 0,
      snapshots: snapshot_tx,
    };
    let handle = tokio::spawn(task.run(command_rx, self.invalidations));

    PagingStream {
      snapshots: snapshot_rx,
      commands: command_tx,
      task: Arc::new(TaskGuard(handle)),
    }
  }
}

struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
  fn drop(&mut self) {
    self.0.abort();
  }
}

/// Handle to a running paging stream.
///
/// Clones share the same stream. The stream stops when `stop()` is called or
/// when the last handle is dropped; an in-flight load is cancelled and its
/// result discarded.
pub struct PagingStream<T> {
  snapshots: watch::Receiver<PagingSnapshot<T>>,
  commands: mpsc::UnboundedSender<PagerCommand>,
  task: Arc<TaskGuard>,
}

impl<T> Clone for PagingStream<T> {
  fn clone(&self) -> Self {
    Self {
      snapshots: self.snapshots.clone(),
      commands: self.commands.clone(),
      task: Arc::clone(&self.task),
    }
  }
}

impl<T: Clone> PagingStream<T> {
  /// Latest published snapshot.
  pub fn snapshot(&self) -> PagingSnapshot<T> {
    self.snapshots.borrow().clone()
  }

  /// Wait for the next snapshot. Returns `None` once the stream has stopped.
  pub async fn changed(&mut self) -> Option<PagingSnapshot<T>> {
    self.snapshots.changed().await.ok()?;
    Some(self.snapshots.borrow_and_update().clone())
  }

  /// Wait for the first snapshot newer than `generation` with no load in flight.
  pub async fn settled_after(&mut self, generation: u64) -> Option<PagingSnapshot<T>> {
    let snapshot = self
      .snapshots
      .wait_for(|s| {
        s.generation > generation
          && !s.load_states.refresh.is_loading()
          && !s.load_states.append.is_loading()
      })
      .await
      .ok()?;
    Some((*snapshot).clone())
  }

  /// Wait until the initial load has finished.
  pub async fn ready(&mut self) -> Option<PagingSnapshot<T>> {
    self.settled_after(0).await
  }

  /// Load after the last item.
  pub fn append(&self) -> bool {
    self.commands.send(PagerCommand::Append).is_ok()
  }

  /// Reload from the first page.
  pub fn refresh(&self) -> bool {
    self.commands.send(PagerCommand::Refresh).is_ok()
  }

  /// Re-issue the last failed load, if any.
  pub fn retry(&self) -> bool {
    self.commands.send(PagerCommand::Retry).is_ok()
  }

  /// Append and wait for the result.
  pub async fn append_settled(&mut self) -> Option<PagingSnapshot<T>> {
    let generation = self.snapshot().generation;
    if !self.append() {
      return None;
    }
    self.settled_after(generation).await
  }

  /// Refresh and wait for the result.
  pub async fn refresh_settled(&mut self) -> Option<PagingSnapshot<T>> {
    let generation = self.snapshot().generation;
    if !self.refresh() {
      return None;
    }
    self.settled_after(generation).await
  }

  /// Stop the stream for every handle.
  pub fn stop(&self) {
    self.task.0.abort();
  }

  pub fn is_stopped(&self) -> bool {
    self.task.0.is_finished()
  }
}

struct PagerTask<T> {
  config: PagingConfig,
  source: Arc<dyn PagingSource<T>>,
  mediator: Option<Arc<dyn RemoteMediator<T>>>,
  pages: Vec<Page<T>>,
  load_states: LoadStates,
  /// The mediator reported there is nothing more to append
  remote_end_reached: bool,
  last_failed: Option<LoadType>,
  remote_refreshes: u64,
  generation: u64,
  snapshots: watch::Sender<PagingSnapshot<T>>,
}

/// Resolves when the store commits, or never when there is nothing to watch.
async fn invalidated(invalidations: &mut Option<watch::Receiver<u64>>) -> bool {
  match invalidations {
    Some(rx) => rx.changed().await.is_ok(),
    None => std::future::pending().await,
  }
}

impl<T> PagerTask<T>
where
  T: Clone + Send + Sync + 'static,
{
  async fn run(
    mut self,
    mut commands: mpsc::UnboundedReceiver<PagerCommand>,
    mut invalidations: Option<watch::Receiver<u64>>,
  ) {
    self.start_up().await;
    mark_seen(&mut invalidations);

    // One command at a time: refresh and append never interleave
    loop {
      tokio::select! {
        command = commands.recv() => {
          let Some(command) = command else { break };
          self.handle(command).await;
          mark_seen(&mut invalidations);
        }
        alive = invalidated(&mut invalidations) => {
          if alive {
            debug!("store changed, reloading window");
            self.reload_window(0).await;
            self.publish();
          } else {
            invalidations = None;
          }
        }
      }
    }
    debug!("paging stream closed");
  }

  async fn start_up(&mut self) {
    let action = match &self.mediator {
      Some(mediator) => mediator.initialize().await,
      None => InitializeAction::SkipInitialRefresh,
    };
    let launch_refresh =
      self.mediator.is_some() && action == InitializeAction::LaunchInitialRefresh;

    match self.load_first().await {
      Ok(page) => {
        self.pages = vec![page];
        self.load_states.refresh = if launch_refresh {
          LoadState::Loading
        } else {
          LoadState::idle()
        };
        self.update_append_state();
      }
      Err(e) => {
        self.load_states.refresh = LoadState::Error(e);
        self.last_failed = Some(LoadType::Refresh);
      }
    }
    self.publish();

    if launch_refresh {
      self.remote_refresh().await;
    }
  }

  async fn handle(&mut self, command: PagerCommand) {
    match command {
      PagerCommand::Refresh => self.refresh().await,
      PagerCommand::Append => self.append().await,
      PagerCommand::Retry => match self.last_failed.take() {
        Some(LoadType::Refresh) => self.refresh().await,
        Some(LoadType::Append) => self.append().await,
        _ => self.publish(),
      },
    }
  }

  async fn refresh(&mut self) {
    if self.mediator.is_some() {
      self.load_states.refresh = LoadState::Loading;
      self.publish();
      self.remote_refresh().await;
      return;
    }

    self.load_states.refresh = LoadState::Loading;
    self.publish();
    match self.load_first().await {
      Ok(page) => {
        self.pages = vec![page];
        self.load_states.refresh = LoadState::idle();
        self.update_append_state();
      }
      // Keep what was visible before the failed refresh
      Err(e) => {
        self.load_states.refresh = LoadState::Error(e);
        self.last_failed = Some(LoadType::Refresh);
      }
    }
    self.publish();
  }

  async fn remote_refresh(&mut self) {
    let Some(mediator) = self.mediator.clone() else {
      return;
    };

    let result = mediator.load(LoadType::Refresh, &self.state()).await;
    self.remote_refreshes += 1;
    match result {
      MediatorResult::Success {
        end_of_pagination_reached,
      } => {
        self.remote_end_reached = end_of_pagination_reached;
        self.load_states.refresh = LoadState::idle();
        self.reload_window(0).await;
      }
      // Stale rows stay visible; the error is reported through the refresh state
      MediatorResult::Error(e) => {
        warn!(error = %e, "refresh failed");
        self.load_states.refresh = LoadState::Error(e.to_string());
        self.last_failed = Some(LoadType::Refresh);
      }
    }
    self.publish();
  }

  async fn append(&mut self) {
    if self.load_states.append.end_of_pagination_reached() {
      self.publish();
      return;
    }

    self.load_states.append = LoadState::Loading;
    self.publish();

    // Serve from the source while it has data
    if let Some(key) = self.next_local_key() {
      let params = LoadParams {
        key,
        load_size: self.config.page_size,
      };
      match self.source.load(params).await {
        LoadResult::Page(page) if !page.data.is_empty() => {
          self.pages.push(page);
          self.update_append_state();
          self.publish();
          return;
        }
        LoadResult::Page(_) => {
          if let Some(last) = self.pages.last_mut() {
            last.next_key = None;
          }
        }
        LoadResult::Error(e) => {
          self.fail_append(e);
          return;
        }
      }
    }

    let Some(mediator) = self.mediator.clone() else {
      self.load_states.append = LoadState::complete();
      self.publish();
      return;
    };
    if self.remote_end_reached {
      self.load_states.append = LoadState::complete();
      self.publish();
      return;
    }

    match mediator.load(LoadType::Append, &self.state()).await {
      MediatorResult::Success {
        end_of_pagination_reached,
      } => {
        self.remote_end_reached = end_of_pagination_reached;
        self.reload_window(self.config.page_size).await;
        self.publish();
      }
      MediatorResult::Error(e) => {
        warn!(error = %e, "append failed");
        self.fail_append(e.to_string());
      }
    }
  }

  fn fail_append(&mut self, error: String) {
    self.load_states.append = LoadState::Error(error);
    self.last_failed = Some(LoadType::Append);
    self.publish();
  }

  /// Key for the next local read; `None` when the source is exhausted.
  fn next_local_key(&self) -> Option<Option<u32>> {
    match self.pages.last() {
      None => Some(None),
      Some(page) => page.next_key.map(Some),
    }
  }

  async fn load_first(&self) -> Result<Page<T>, String> {
    let params = LoadParams {
      key: None,
      load_size: self.config.initial_load_size,
    };
    match self.source.load(params).await {
      LoadResult::Page(page) => Ok(page),
      LoadResult::Error(e) => Err(e),
    }
  }

  /// Re-read the whole window from the start, growing it by `extra` items.
  async fn reload_window(&mut self, extra: u32) {
    let current = self.pages.iter().map(|p| p.data.len()).sum::<usize>() as u32;
    let load_size = (current + extra).max(self.config.initial_load_size);

    match self
      .source
      .load(LoadParams {
        key: None,
        load_size,
      })
      .await
    {
      LoadResult::Page(page) => {
        if page.data.is_empty() {
          // Cache was cleared underneath us; let the next append ask the mediator again
          self.remote_end_reached = false;
        }
        self.pages = vec![page];
        self.update_append_state();
      }
      LoadResult::Error(e) => {
        warn!(error = %e, "failed to reload window");
        self.load_states.refresh = LoadState::Error(e);
        self.last_failed = Some(LoadType::Refresh);
      }
    }
  }

  fn update_append_state(&mut self) {
    let local_exhausted = self.next_local_key().is_none();
    let remote_exhausted = self.mediator.is_none() || self.remote_end_reached;
    self.load_states.append = if local_exhausted && remote_exhausted {
      LoadState::complete()
    } else {
      LoadState::idle()
    };
  }

  fn state(&self) -> PagingState<T> {
    PagingState::new(self.pages.clone(), self.config)
  }

  fn publish(&mut self) {
    self.generation += 1;
    let items: Vec<T> = self
      .pages
      .iter()
      .flat_map(|p| p.data.iter().cloned())
      .collect();
    self.snapshots.send_replace(PagingSnapshot {
      items: Arc::new(items),
      load_states: self.load_states.clone(),
      remote_refreshes: self.remote_refreshes,
      generation: self.generation,
    });
  }
}

fn mark_seen(invalidations: &mut Option<watch::Receiver<u64>>) {
  if let Some(rx) = invalidations.as_mut() {
    rx.borrow_and_update();
  }
}
