//! Character rows: synchronous DAO plus the async store façade.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;

use crate::catalog::{Character, CharacterStatus};
use crate::db::{Database, StoreError};

/// A cached character row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterEntity {
  pub id: i64,
  pub name: String,
  /// Raw status string as sent by the API
  pub status: String,
  pub species: String,
  pub image: String,
  /// Remote page this row was last fetched as part of
  pub page: u32,
}

impl CharacterEntity {
  pub fn into_domain(self) -> Character {
    Character {
      status: CharacterStatus::parse(Some(&self.status)),
      id: self.id,
      name: self.name,
      species: self.species,
      image: self.image,
    }
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      name: row.get(1)?,
      status: row.get(2)?,
      species: row.get(3)?,
      image: row.get(4)?,
      page: row.get(5)?,
    })
  }
}

const COLUMNS: &str = "id, name, status, species, image, page";

/// SQL access to the `characters` table.
///
/// Functions take a plain connection so they compose inside a caller's transaction.
pub struct CharacterDao;

impl CharacterDao {
  pub fn upsert_many(conn: &Connection, rows: &[CharacterEntity]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
      "INSERT OR REPLACE INTO characters (id, name, status, species, image, page)
       VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    for row in rows {
      stmt.execute(params![
        row.id,
        row.name,
        row.status,
        row.species,
        row.image,
        row.page
      ])?;
    }
    Ok(())
  }

  pub fn upsert_one(conn: &Connection, row: &CharacterEntity) -> Result<(), StoreError> {
    Self::upsert_many(conn, std::slice::from_ref(row))
  }

  pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<CharacterEntity>, StoreError> {
    let sql = format!("SELECT {} FROM characters WHERE id = ?", COLUMNS);
    Ok(
      conn
        .query_row(&sql, params![id], CharacterEntity::from_row)
        .optional()?,
    )
  }

  pub fn get_by_page(conn: &Connection, page: u32) -> Result<Vec<CharacterEntity>, StoreError> {
    let sql = format!(
      "SELECT {} FROM characters WHERE page = ? ORDER BY id",
      COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
      .query_map(params![page], CharacterEntity::from_row)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
  }

  /// Rows ordered by id, starting at `offset`.
  pub fn window(
    conn: &Connection,
    offset: u32,
    limit: u32,
  ) -> Result<Vec<CharacterEntity>, StoreError> {
    let sql = format!(
      "SELECT {} FROM characters ORDER BY id LIMIT ? OFFSET ?",
      COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
      .query_map(params![limit, offset], CharacterEntity::from_row)?
      .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
  }

  pub fn count(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM characters", [], |r| r.get(0))?;
    Ok(count as u64)
  }

  /// Row with the highest id.
  pub fn get_last(conn: &Connection) -> Result<Option<CharacterEntity>, StoreError> {
    let sql = format!(
      "SELECT {} FROM characters ORDER BY id DESC LIMIT 1",
      COLUMNS
    );
    Ok(
      conn
        .query_row(&sql, [], CharacterEntity::from_row)
        .optional()?,
    )
  }

  pub fn clear_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("DELETE FROM characters", [])?;
    Ok(())
  }
}

/// Async access to cached characters.
#[derive(Clone)]
pub struct CharacterStore {
  db: Database,
}

impl CharacterStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  pub async fn upsert_many(&self, rows: Vec<CharacterEntity>) -> Result<(), StoreError> {
    self
      .db
      .write(move |tx| CharacterDao::upsert_many(tx, &rows))
      .await
  }

  pub async fn upsert_one(&self, row: CharacterEntity) -> Result<(), StoreError> {
    self
      .db
      .write(move |tx| CharacterDao::upsert_one(tx, &row))
      .await
  }

  pub async fn get_by_id(&self, id: i64) -> Result<Option<CharacterEntity>, StoreError> {
    self
      .db
      .read(move |conn| CharacterDao::get_by_id(conn, id))
      .await
  }

  pub async fn get_by_page(&self, page: u32) -> Result<Vec<CharacterEntity>, StoreError> {
    self
      .db
      .read(move |conn| CharacterDao::get_by_page(conn, page))
      .await
  }

  pub async fn window(&self, offset: u32, limit: u32) -> Result<Vec<CharacterEntity>, StoreError> {
    self
      .db
      .read(move |conn| CharacterDao::window(conn, offset, limit))
      .await
  }

  pub async fn count(&self) -> Result<u64, StoreError> {
    self.db.read(CharacterDao::count).await
  }

  pub async fn get_last(&self) -> Result<Option<CharacterEntity>, StoreError> {
    self.db.read(CharacterDao::get_last).await
  }

  /// Remove every cached character and its remote key.
  pub async fn clear_all(&self) -> Result<(), StoreError> {
    self
      .db
      .write(|tx| {
        crate::cache::RemoteKeyDao::clear_all(tx)?;
        CharacterDao::clear_all(tx)
      })
      .await
  }

  /// Notified after every committed write to the cache.
  pub fn invalidations(&self) -> watch::Receiver<u64> {
    self.db.subscribe()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn entity(id: i64, name: &str, page: u32) -> CharacterEntity {
    CharacterEntity {
      id,
      name: name.to_string(),
      status: "Alive".to_string(),
      species: "Human".to_string(),
      image: format!("https://example.test/avatar/{}.jpeg", id),
      page,
    }
  }

  fn store() -> CharacterStore {
    CharacterStore::new(Database::open_in_memory().unwrap())
  }

  #[tokio::test]
  async fn test_upsert_is_last_write_wins() {
    let store = store();
    store.upsert_one(entity(1, "Rick", 1)).await.unwrap();

    let mut updated = entity(1, "Rick Sanchez", 2);
    updated.status = "Dead".to_string();
    store.upsert_one(updated.clone()).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.get_by_id(1).await.unwrap(), Some(updated));
  }

  #[tokio::test]
  async fn test_get_by_id_missing() {
    let store = store();
    assert_eq!(store.get_by_id(42).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_get_last_is_highest_id() {
    let store = store();
    assert_eq!(store.get_last().await.unwrap(), None);

    store
      .upsert_many(vec![entity(3, "c", 1), entity(10, "j", 2), entity(7, "g", 1)])
      .await
      .unwrap();

    assert_eq!(store.get_last().await.unwrap().map(|e| e.id), Some(10));
  }

  #[tokio::test]
  async fn test_window_is_ordered_by_id() {
    let store = store();
    store
      .upsert_many((1..=5).rev().map(|i| entity(i, "x", 1)).collect())
      .await
      .unwrap();

    let ids: Vec<i64> = store
      .window(1, 3)
      .await
      .unwrap()
      .into_iter()
      .map(|e| e.id)
      .collect();
    assert_eq!(ids, vec![2, 3, 4]);

    assert!(store.window(5, 3).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_get_by_page() {
    let store = store();
    store
      .upsert_many(vec![entity(1, "a", 1), entity(2, "b", 1), entity(21, "u", 2)])
      .await
      .unwrap();

    let page_two = store.get_by_page(2).await.unwrap();
    assert_eq!(page_two.len(), 1);
    assert_eq!(page_two[0].id, 21);
  }

  #[tokio::test]
  async fn test_clear_all() {
    let store = store();
    store
      .upsert_many(vec![entity(1, "a", 1), entity(2, "b", 1)])
      .await
      .unwrap();

    store.clear_all().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_entity_into_domain() {
    let character = entity(1, "Rick Sanchez", 1).into_domain();
    assert_eq!(character.status, CharacterStatus::Alive);
    assert_eq!(character.species, "Human");
  }
}
