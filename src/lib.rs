//! Offline-first paged access to a remote character catalog.
//!
//! The remote catalog is mirrored into a local SQLite cache page by page.
//! Consumers read from the cache through [`paging::PagingStream`]s, and a
//! remote mediator fetches more pages when the local data runs out.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod feed;
pub mod logging;
pub mod paging;
pub mod query;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;
