//! Serde-deserializable types matching the catalog API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::{Deserialize, Serialize};

// ============================================================================
// Paged list endpoint response
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiPageInfo {
  #[serde(default)]
  pub count: u64,
  #[serde(default)]
  pub pages: u32,
  /// URL of the next page, absent on the last page
  pub next: Option<String>,
  pub prev: Option<String>,
}

/// One page of characters, as returned by `GET /character?page=N`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageResponse {
  #[serde(default)]
  pub info: ApiPageInfo,
  #[serde(default)]
  pub results: Vec<CharacterDto>,
}

impl PageResponse {
  pub fn has_next(&self) -> bool {
    self.info.next.is_some()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CharacterDto {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub species: String,
  #[serde(rename = "type", default)]
  pub kind: String,
  #[serde(default)]
  pub gender: String,
  #[serde(default)]
  pub image: String,
}

/// Error body the API sends alongside non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub error: String,
}

// ============================================================================
// Conversions to domain and cache types
// ============================================================================

use super::types::{Character, CharacterStatus};
use crate::cache::CharacterEntity;

impl CharacterDto {
  pub fn into_domain(self) -> Character {
    Character {
      status: CharacterStatus::parse(Some(&self.status)),
      id: self.id,
      name: self.name,
      species: self.species,
      image: self.image,
    }
  }

  pub fn into_entity(self, page: u32) -> CharacterEntity {
    CharacterEntity {
      id: self.id,
      name: self.name,
      status: self.status,
      species: self.species,
      image: self.image,
      page,
    }
  }
}
