//! Remote key ledger: per-character pagination continuation.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{Database, StoreError};

/// Which pages surround the page a cached character came from.
///
/// `next_page == None` means the query that produced this character has no
/// further pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteKey {
  pub character_id: i64,
  pub prev_page: Option<u32>,
  pub next_page: Option<u32>,
}

impl RemoteKey {
  /// Keys for a character fetched as part of `page`.
  pub fn for_page(character_id: i64, page: u32, end_of_pagination: bool) -> Self {
    Self {
      character_id,
      prev_page: if page == 1 { None } else { Some(page - 1) },
      next_page: if end_of_pagination {
        None
      } else {
        Some(page + 1)
      },
    }
  }
}

fn key_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RemoteKey> {
  Ok(RemoteKey {
    character_id: row.get(0)?,
    prev_page: row.get(1)?,
    next_page: row.get(2)?,
  })
}

pub struct RemoteKeyDao;

impl RemoteKeyDao {
  pub fn get(conn: &Connection, character_id: i64) -> Result<Option<RemoteKey>, StoreError> {
    Ok(
      conn
        .query_row(
          "SELECT character_id, prev_page, next_page FROM remote_keys WHERE character_id = ?",
          params![character_id],
          key_from_row,
        )
        .optional()?,
    )
  }

  /// Key of the highest keyed character with an id no greater than `character_id`.
  ///
  /// Rows cached by id lookups carry no key; this skips past them to the
  /// last character a catalog page produced.
  pub fn last_at_or_below(
    conn: &Connection,
    character_id: i64,
  ) -> Result<Option<RemoteKey>, StoreError> {
    Ok(
      conn
        .query_row(
          "SELECT character_id, prev_page, next_page FROM remote_keys
           WHERE character_id <= ? ORDER BY character_id DESC LIMIT 1",
          params![character_id],
          key_from_row,
        )
        .optional()?,
    )
  }

  pub fn upsert_many(conn: &Connection, keys: &[RemoteKey]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
      "INSERT OR REPLACE INTO remote_keys (character_id, prev_page, next_page) VALUES (?, ?, ?)",
    )?;
    for key in keys {
      stmt.execute(params![key.character_id, key.prev_page, key.next_page])?;
    }
    Ok(())
  }

  pub fn clear_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("DELETE FROM remote_keys", [])?;
    Ok(())
  }
}

/// Async access to remote keys. Only the sync mediator reads these.
#[derive(Clone)]
pub struct RemoteKeyLedger {
  db: Database,
}

impl RemoteKeyLedger {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  pub async fn get(&self, character_id: i64) -> Result<Option<RemoteKey>, StoreError> {
    self
      .db
      .read(move |conn| RemoteKeyDao::get(conn, character_id))
      .await
  }

  pub async fn last_at_or_below(&self, character_id: i64) -> Result<Option<RemoteKey>, StoreError> {
    self
      .db
      .read(move |conn| RemoteKeyDao::last_at_or_below(conn, character_id))
      .await
  }

  pub async fn upsert_many(&self, keys: Vec<RemoteKey>) -> Result<(), StoreError> {
    self
      .db
      .write(move |tx| RemoteKeyDao::upsert_many(tx, &keys))
      .await
  }

  pub async fn clear_all(&self) -> Result<(), StoreError> {
    self.db.write(|tx| RemoteKeyDao::clear_all(tx)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_for_first_page() {
    let key = RemoteKey::for_page(1, 1, false);
    assert_eq!(key.prev_page, None);
    assert_eq!(key.next_page, Some(2));
  }

  #[test]
  fn test_keys_for_last_page() {
    let key = RemoteKey::for_page(41, 3, true);
    assert_eq!(key.prev_page, Some(2));
    assert_eq!(key.next_page, None);
  }

  #[tokio::test]
  async fn test_ledger_roundtrip_and_clear() {
    let ledger = RemoteKeyLedger::new(Database::open_in_memory().unwrap());
    assert_eq!(ledger.get(1).await.unwrap(), None);

    ledger
      .upsert_many(vec![
        RemoteKey::for_page(1, 1, false),
        RemoteKey::for_page(21, 2, true),
      ])
      .await
      .unwrap();

    assert_eq!(ledger.get(1).await.unwrap().unwrap().next_page, Some(2));
    assert_eq!(ledger.get(21).await.unwrap().unwrap().next_page, None);

    // Replacing a key keeps one row per character
    ledger
      .upsert_many(vec![RemoteKey::for_page(1, 4, true)])
      .await
      .unwrap();
    assert_eq!(ledger.get(1).await.unwrap().unwrap().prev_page, Some(3));

    ledger.clear_all().await.unwrap();
    assert_eq!(ledger.get(21).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_last_at_or_below_skips_unkeyed_ids() {
    let ledger = RemoteKeyLedger::new(Database::open_in_memory().unwrap());
    ledger
      .upsert_many(vec![
        RemoteKey::for_page(3, 2, false),
        RemoteKey::for_page(4, 2, false),
        RemoteKey::for_page(9, 5, true),
      ])
      .await
      .unwrap();

    assert_eq!(ledger.last_at_or_below(4).await.unwrap().unwrap().character_id, 4);
    assert_eq!(ledger.last_at_or_below(8).await.unwrap().unwrap().character_id, 4);
    assert_eq!(ledger.last_at_or_below(500).await.unwrap().unwrap().character_id, 9);
    assert_eq!(ledger.last_at_or_below(2).await.unwrap(), None);
  }
}
