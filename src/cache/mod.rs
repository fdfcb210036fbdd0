//! Local persistence for the character catalog.
//!
//! This module provides:
//! - The character table (insert, point lookup, page and window reads, clear)
//! - The remote key ledger used to continue pagination from cache alone
//! - A cache-first layer for single-character lookups with network fallback

mod characters;
mod layer;
mod remote_keys;
mod traits;

pub use characters::{CharacterDao, CharacterEntity, CharacterStore};
pub use layer::CacheLayer;
pub use remote_keys::{RemoteKey, RemoteKeyDao, RemoteKeyLedger};
pub use traits::{CacheResult, CacheSource};

#[cfg(test)]
pub(crate) use characters::tests::entity;
