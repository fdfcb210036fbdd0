//! Test doubles shared by unit tests across modules.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::api_types::ApiPageInfo;
use crate::catalog::{ApiError, CatalogApi, CharacterDto, PageResponse};

pub fn dto(id: i64, name: &str, status: &str) -> CharacterDto {
  CharacterDto {
    id,
    name: name.to_string(),
    status: status.to_string(),
    species: "Human".to_string(),
    kind: String::new(),
    gender: "Male".to_string(),
    image: format!("https://example.test/avatar/{}.jpeg", id),
  }
}

fn page_response(page: u32, total_pages: u32, results: Vec<CharacterDto>) -> PageResponse {
  let link = |p: u32| format!("https://example.test/api/character?page={}", p);
  PageResponse {
    info: ApiPageInfo {
      count: results.len() as u64,
      pages: total_pages,
      next: (page < total_pages).then(|| link(page + 1)),
      prev: (page > 1).then(|| link(page - 1)),
    },
    results,
  }
}

/// Scripted in-memory catalog that records every request.
#[derive(Default)]
pub struct FakeCatalog {
  pages: Mutex<BTreeMap<u32, PageResponse>>,
  characters: Mutex<BTreeMap<i64, CharacterDto>>,
  page_failure: Mutex<Option<ApiError>>,
  id_failure: Mutex<Option<ApiError>>,
  delay: Mutex<Option<Duration>>,
  page_requests: Mutex<Vec<(u32, Option<String>)>>,
  id_requests: Mutex<Vec<i64>>,
}

impl FakeCatalog {
  /// `total_pages` pages of `per_page` characters with consecutive ids from 1.
  pub fn with_pages(total_pages: u32, per_page: u32) -> Self {
    let catalog = Self::default();
    for page in 1..=total_pages {
      let first = ((page - 1) * per_page) as i64 + 1;
      let results = (first..first + per_page as i64)
        .map(|id| dto(id, &format!("Character {}", id), "Alive"))
        .collect();
      catalog.set_page(page, total_pages, results);
    }
    catalog
  }

  pub fn set_page(&self, page: u32, total_pages: u32, results: Vec<CharacterDto>) {
    let mut characters = self.characters.lock().unwrap();
    for c in &results {
      characters.insert(c.id, c.clone());
    }
    self
      .pages
      .lock()
      .unwrap()
      .insert(page, page_response(page, total_pages, results));
  }

  pub fn insert_character(&self, character: CharacterDto) {
    self.characters.lock().unwrap().insert(character.id, character);
  }

  pub fn fail_pages_with(&self, error: ApiError) {
    *self.page_failure.lock().unwrap() = Some(error);
  }

  pub fn fail_ids_with(&self, error: ApiError) {
    *self.id_failure.lock().unwrap() = Some(error);
  }

  pub fn clear_failures(&self) {
    *self.page_failure.lock().unwrap() = None;
    *self.id_failure.lock().unwrap() = None;
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = Some(delay);
  }

  pub fn page_requests(&self) -> Vec<(u32, Option<String>)> {
    self.page_requests.lock().unwrap().clone()
  }

  pub fn page_calls(&self) -> usize {
    self.page_requests.lock().unwrap().len()
  }

  pub fn id_calls(&self) -> usize {
    self.id_requests.lock().unwrap().len()
  }

  fn current_delay(&self) -> Option<Duration> {
    *self.delay.lock().unwrap()
  }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
  async fn fetch_page(&self, page: u32, name: Option<&str>) -> Result<PageResponse, ApiError> {
    self
      .page_requests
      .lock()
      .unwrap()
      .push((page, name.map(String::from)));

    if let Some(delay) = self.current_delay() {
      tokio::time::sleep(delay).await;
    }
    if let Some(error) = self.page_failure.lock().unwrap().clone() {
      return Err(error);
    }

    self
      .pages
      .lock()
      .unwrap()
      .get(&page)
      .cloned()
      .ok_or_else(|| ApiError::NotFound {
        message: "There is nothing here".to_string(),
      })
  }

  async fn fetch_by_id(&self, id: i64) -> Result<CharacterDto, ApiError> {
    self.id_requests.lock().unwrap().push(id);

    if let Some(error) = self.id_failure.lock().unwrap().clone() {
      return Err(error);
    }

    self
      .characters
      .lock()
      .unwrap()
      .get(&id)
      .cloned()
      .ok_or_else(|| ApiError::NotFound {
        message: "Character not found".to_string(),
      })
  }
}
