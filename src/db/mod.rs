pub mod schema;

use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// Failure talking to the local cache database.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to create database directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("could not determine data directory")]
  NoDataDir,

  #[error("database lock poisoned")]
  LockPoisoned,

  #[error("database task failed: {0}")]
  Task(String),
}

/// Database connection wrapper for the catalog cache.
///
/// All statements run on the blocking thread pool behind a single mutex.
/// Writes run inside one transaction and bump a generation counter after
/// commit, so subscribers only ever re-read committed state.
#[derive(Clone)]
pub struct Database {
  conn: Arc<Mutex<Connection>>,
  generation: Arc<watch::Sender<u64>>,
}

impl Database {
  /// Open or create the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    debug!(path = %path.display(), "opening cache database");
    Self::from_connection(Connection::open(&path)?)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(schema::SCHEMA)?;
    let (generation, _) = watch::channel(0);

    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
      generation: Arc::new(generation),
    })
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StoreError::NoDataDir)?;

    Ok(data_dir.join("charvault").join("cache.db"))
  }

  /// Run a read-only closure against the connection.
  pub async fn read<R, F>(&self, f: F) -> Result<R, StoreError>
  where
    R: Send + 'static,
    F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
      f(&conn)
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
  }

  /// Run a closure inside a single transaction.
  ///
  /// The transaction commits only if the closure returns `Ok`; otherwise it
  /// rolls back and no subscriber is notified.
  pub async fn write<R, F>(&self, f: F) -> Result<R, StoreError>
  where
    R: Send + 'static,
    F: FnOnce(&Transaction<'_>) -> Result<R, StoreError> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    let result = tokio::task::spawn_blocking(move || {
      let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
      let tx = conn.transaction()?;
      let result = f(&tx)?;
      tx.commit()?;
      Ok::<_, StoreError>(result)
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))??;

    self.generation.send_modify(|g| *g += 1);
    Ok(result)
  }

  /// Subscribe to commit notifications.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.generation.subscribe()
  }

  /// Number of committed writes since the database was opened.
  pub fn generation(&self) -> u64 {
    *self.generation.borrow()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_schema_creates_tables() {
    let db = Database::open_in_memory().unwrap();
    let tables: Vec<String> = db
      .read(|conn| {
        let mut stmt =
          conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
          .query_map([], |row| row.get(0))?
          .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
      })
      .await
      .unwrap();

    assert_eq!(tables, vec!["characters", "remote_keys"]);
  }

  #[tokio::test]
  async fn test_failed_write_rolls_back_and_keeps_generation() {
    let db = Database::open_in_memory().unwrap();
    let mut rx = db.subscribe();

    let result: Result<(), StoreError> = db
      .write(|tx| {
        tx.execute(
          "INSERT INTO remote_keys (character_id, prev_page, next_page) VALUES (1, NULL, 2)",
          [],
        )?;
        tx.execute("INSERT INTO no_such_table VALUES (1)", [])?;
        Ok(())
      })
      .await;

    assert!(result.is_err());
    assert_eq!(db.generation(), 0);
    assert!(!rx.has_changed().unwrap());

    let count: i64 = db
      .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM remote_keys", [], |r| r.get(0))?))
      .await
      .unwrap();
    assert_eq!(count, 0);
  }

  #[tokio::test]
  async fn test_committed_write_notifies_subscribers() {
    let db = Database::open_in_memory().unwrap();
    let mut rx = db.subscribe();

    db.write(|tx| {
      tx.execute(
        "INSERT INTO remote_keys (character_id, prev_page, next_page) VALUES (1, NULL, 2)",
        [],
      )?;
      Ok(())
    })
    .await
    .unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), 1);
  }
}
