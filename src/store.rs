//! Submission queue storage: trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::submission::{NewSubmission, PendingSubmission};

/// Trait for the buffered-submission store.
///
/// Every row is a submission captured while offline and not yet confirmed
/// delivered. Rows are write-once; the only mutation is delete-on-delivery.
pub trait QueueStorage: Send + Sync {
  /// Append a submission and return it with its assigned id.
  fn insert(&self, submission: &NewSubmission) -> Result<PendingSubmission>;

  /// Read every buffered submission, in insertion order.
  fn snapshot(&self) -> Result<Vec<PendingSubmission>>;

  /// Remove a single submission by id.
  fn delete(&self, id: i64) -> Result<()>;

  /// Number of buffered submissions.
  fn pending_count(&self) -> Result<usize>;
}

/// SQLite-backed submission queue.
pub struct SqliteQueue {
  conn: Mutex<Connection>,
}

/// Schema for the queue table. The key is assigned by SQLite on insert and
/// never reused, so ids are unique and monotonically issued.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question1 TEXT NOT NULL,
    question2 TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
"#;

impl SqliteQueue {
  /// Open or create the queue database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the queue database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open queue database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory queue. Used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let queue = Self {
      conn: Mutex::new(conn),
    };
    queue.run_migrations()?;
    Ok(queue)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("mcqsync").join("offline.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(QUEUE_SCHEMA)
      .map_err(|e| eyre!("Failed to run queue migrations: {}", e))?;

    Ok(())
  }
}

impl QueueStorage for SqliteQueue {
  fn insert(&self, submission: &NewSubmission) -> Result<PendingSubmission> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT INTO responses (question1, question2, timestamp) VALUES (?, ?, ?)",
        params![
          submission.question1,
          submission.question2,
          submission.timestamp.to_rfc3339()
        ],
      )
      .map_err(|e| eyre!("Failed to buffer submission: {}", e))?;

    Ok(PendingSubmission {
      id: conn.last_insert_rowid(),
      question1: submission.question1.clone(),
      question2: submission.question2.clone(),
      timestamp: submission.timestamp,
    })
  }

  fn snapshot(&self) -> Result<Vec<PendingSubmission>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT id, question1, question2, timestamp FROM responses ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare snapshot query: {}", e))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
        ))
      })
      .map_err(|e| eyre!("Failed to read buffered submissions: {}", e))?;

    let mut submissions = Vec::new();
    for row in rows {
      let (id, question1, question2, timestamp) =
        row.map_err(|e| eyre!("Failed to read buffered submission row: {}", e))?;
      submissions.push(PendingSubmission {
        id,
        question1,
        question2,
        timestamp: parse_timestamp(&timestamp)?,
      });
    }

    Ok(submissions)
  }

  fn delete(&self, id: i64) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM responses WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete submission {}: {}", id, e))?;

    Ok(())
  }

  fn pending_count(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count buffered submissions: {}", e))?;

    Ok(count as usize)
  }
}

/// Parse an RFC 3339 timestamp stored by `insert`.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse timestamp '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::submission::{Answers, RawForm};

  fn submission(q1: &str, q2: &str) -> NewSubmission {
    Answers {
      question1: q1.to_string(),
      question2: q2.to_string(),
    }
    .stamped()
  }

  #[test]
  fn test_insert_assigns_increasing_ids() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let first = queue.insert(&submission("A", "B")).unwrap();
    let second = queue.insert(&submission("C", "D")).unwrap();

    assert!(second.id > first.id);
  }

  #[test]
  fn test_insert_returns_stored_record() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let stored = queue.insert(&submission("A", "B")).unwrap();

    assert_eq!(stored.question1, "A");
    assert_eq!(stored.question2, "B");
    assert_eq!(queue.pending_count().unwrap(), 1);
  }

  #[test]
  fn test_snapshot_returns_all_in_insertion_order() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let a = queue.insert(&submission("A", "B")).unwrap();
    let b = queue.insert(&submission("C", "D")).unwrap();

    let all = queue.snapshot().unwrap();
    assert_eq!(all, vec![a, b]);
  }

  #[test]
  fn test_snapshot_round_trips_timestamp() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let stamp = "2024-05-01T10:30:00Z".parse().unwrap();
    let payload = RawForm {
      question1: Some("A".to_string()),
      question2: Some("B".to_string()),
    }
    .validate()
    .unwrap()
    .stamped_at(stamp);

    queue.insert(&payload).unwrap();

    let all = queue.snapshot().unwrap();
    assert_eq!(all[0].timestamp, stamp);
  }

  #[test]
  fn test_delete_removes_only_target() {
    let queue = SqliteQueue::open_in_memory().unwrap();

    let a = queue.insert(&submission("A", "B")).unwrap();
    let b = queue.insert(&submission("C", "D")).unwrap();

    queue.delete(a.id).unwrap();

    let all = queue.snapshot().unwrap();
    assert_eq!(all, vec![b]);
  }

  #[test]
  fn test_empty_queue_counts_zero() {
    let queue = SqliteQueue::open_in_memory().unwrap();
    assert_eq!(queue.pending_count().unwrap(), 0);
    assert!(queue.snapshot().unwrap().is_empty());
  }
}
