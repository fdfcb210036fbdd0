//! Paged loading of the catalog.
//!
//! A [`Pager`] owns one stream: it reads items from a [`PagingSource`] and,
//! for the durable catalog, lets a [`RemoteMediator`] refill the local cache
//! from the network. Observers receive [`PagingSnapshot`]s through a
//! [`PagingStream`] handle.

pub mod mediator;
pub mod pager;
pub mod source;
pub mod state;

pub use mediator::{CharacterRemoteMediator, MediatorError, MediatorResult, RemoteMediator};
pub use pager::{Pager, PagingStream};
pub use source::{CharacterPagingSource, PagingSource, SearchPagingSource};
pub use state::{
  InitializeAction, LoadParams, LoadResult, LoadState, LoadStates, LoadType, Page, PagingConfig,
  PagingSnapshot, PagingState,
};
