//! Asset storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{CachedAsset, FetchedAsset};

/// Trait for asset storage backends.
///
/// A cache is a named set of path-keyed blobs; `replace_all` swaps a cache's
/// entire contents in one transaction so a failed install never leaves a
/// partial cache behind.
pub trait AssetStorage: Send + Sync {
  /// Replace the contents of the named cache with the given entries.
  fn replace_all(&self, cache_name: &str, entries: &[(String, FetchedAsset)]) -> Result<()>;

  /// Look up a cached asset by exact path.
  fn get(&self, cache_name: &str, path: &str) -> Result<Option<CachedAsset>>;

  /// Paths currently stored for the named cache.
  fn paths(&self, cache_name: &str) -> Result<Vec<String>>;

  /// Number of assets stored for the named cache.
  fn entry_count(&self, cache_name: &str) -> Result<usize>;
}

/// SQLite-based asset storage.
pub struct SqliteAssets {
  conn: Mutex<Connection>,
}

/// Schema for the asset table.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS assets (
    cache_name TEXT NOT NULL,
    path TEXT NOT NULL,
    body BLOB NOT NULL,
    content_type TEXT,
    checksum TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_name, path)
);
"#;

impl SqliteAssets {
  /// Open or create the asset store at the default location.
  ///
  /// Shares the queue's database file; each store holds its own connection.
  pub fn open() -> Result<Self> {
    Self::open_at(&crate::store::SqliteQueue::default_path()?)
  }

  /// Open or create the asset store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open asset database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory asset store. Used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(ASSET_SCHEMA)
      .map_err(|e| eyre!("Failed to run asset migrations: {}", e))?;

    Ok(())
  }
}

impl AssetStorage for SqliteAssets {
  fn replace_all(&self, cache_name: &str, entries: &[(String, FetchedAsset)]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    conn
      .execute("DELETE FROM assets WHERE cache_name = ?", params![cache_name])
      .map_err(|e| eyre!("Failed to clear cache {}: {}", cache_name, e))?;

    for (path, fetched) in entries {
      let checksum = hex::encode(Sha256::digest(&fetched.body));

      conn
        .execute(
          "INSERT INTO assets (cache_name, path, body, content_type, checksum, cached_at)
           VALUES (?, ?, ?, ?, ?, datetime('now'))",
          params![
            cache_name,
            path,
            fetched.body,
            fetched.content_type,
            checksum
          ],
        )
        .map_err(|e| eyre!("Failed to store asset {}: {}", path, e))?;
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get(&self, cache_name: &str, path: &str) -> Result<Option<CachedAsset>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT body, content_type, checksum, cached_at FROM assets
         WHERE cache_name = ? AND path = ?",
      )
      .map_err(|e| eyre!("Failed to prepare asset query: {}", e))?;

    let result: Option<(Vec<u8>, Option<String>, String, String)> = stmt
      .query_row(params![cache_name, path], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match result {
      Some((body, content_type, checksum, cached_at_str)) => Ok(Some(CachedAsset {
        path: path.to_string(),
        content_type,
        checksum,
        body,
        cached_at: parse_datetime(&cached_at_str)?,
      })),
      None => Ok(None),
    }
  }

  fn paths(&self, cache_name: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT path FROM assets WHERE cache_name = ? ORDER BY path")
      .map_err(|e| eyre!("Failed to prepare path query: {}", e))?;

    let paths = stmt
      .query_map(params![cache_name], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cached paths: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(paths)
  }

  fn entry_count(&self, cache_name: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM assets WHERE cache_name = ?",
        params![cache_name],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cached assets: {}", e))?;

    Ok(count as usize)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
