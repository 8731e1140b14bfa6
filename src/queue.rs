//! Submission queue manager: capture and offline/online reconciliation.
//!
//! The manager owns no network client of its own; every operation takes an
//! uploader closure, so the HTTP layer (or a test double) is injected per
//! call.

use color_eyre::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::store::QueueStorage;
use crate::submission::{NewSubmission, PendingSubmission, RawForm};

/// What happened to a captured submission.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
  /// Uploaded directly; nothing was buffered.
  Uploaded,
  /// Captured while offline and buffered with the returned record.
  Buffered(PendingSubmission),
  /// Direct upload failed; the submission was dropped, not buffered.
  ///
  /// The error is logged for the operator; the submitter sees no failure
  /// state.
  UploadFailed,
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Records in the snapshot when the cycle started.
  pub attempted: usize,
  /// Records confirmed delivered and removed from the store.
  pub delivered: usize,
  /// Records whose upload failed; they stay buffered for the next cycle.
  pub retained: usize,
}

/// Queue manager over an explicit storage capability.
pub struct SubmissionQueue<S: QueueStorage> {
  storage: Arc<S>,
}

impl<S: QueueStorage> SubmissionQueue<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Capture one submission.
  ///
  /// Validates the form, stamps a timestamp, then either buffers the record
  /// (offline) or uploads it immediately (online). The offline insert is
  /// awaited and the stored record returned, so callers observe completion.
  pub async fn capture<F, Fut>(
    &self,
    form: RawForm,
    online: bool,
    upload: F,
  ) -> Result<CaptureOutcome>
  where
    F: FnOnce(NewSubmission) -> Fut,
    Fut: Future<Output = Result<Value>>,
  {
    let submission = form.validate()?.stamped();

    if !online {
      let stored = self.storage.insert(&submission)?;
      debug!(id = stored.id, "buffered submission while offline");
      return Ok(CaptureOutcome::Buffered(stored));
    }

    match upload(submission).await {
      Ok(_) => Ok(CaptureOutcome::Uploaded),
      Err(e) => {
        error!("direct upload failed: {e:#}");
        Ok(CaptureOutcome::UploadFailed)
      }
    }
  }

  /// Run one sync cycle: deliver every currently buffered submission.
  ///
  /// The batch is snapshotted before any delete. Records upload
  /// independently and concurrently; a record is deleted exactly when its
  /// own upload succeeded, and a failed record stays buffered untouched
  /// until the next cycle. An empty queue issues no network calls.
  pub async fn sync_pending<F, Fut>(&self, upload: F) -> Result<SyncReport>
  where
    F: Fn(PendingSubmission) -> Fut,
    Fut: Future<Output = Result<Value>>,
  {
    let batch = self.storage.snapshot()?;
    if batch.is_empty() {
      return Ok(SyncReport::default());
    }

    let attempted = batch.len();
    debug!(attempted, "starting sync cycle");

    let attempts = batch.into_iter().map(|item| {
      let id = item.id;
      let fut = upload(item);
      async move { (id, fut.await) }
    });

    let mut delivered = 0;
    let mut retained = 0;
    for (id, result) in futures::future::join_all(attempts).await {
      match result {
        Ok(_) => {
          self.storage.delete(id)?;
          delivered += 1;
        }
        Err(e) => {
          warn!(id, "sync upload failed, keeping record buffered: {e:#}");
          retained += 1;
        }
      }
    }

    Ok(SyncReport {
      attempted,
      delivered,
      retained,
    })
  }

  /// Number of buffered submissions.
  pub fn pending_count(&self) -> Result<usize> {
    self.storage.pending_count()
  }

  /// Snapshot of the buffered submissions.
  #[allow(dead_code)]
  pub fn pending(&self) -> Result<Vec<PendingSubmission>> {
    self.storage.snapshot()
  }
}

impl<S: QueueStorage> Clone for SubmissionQueue<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::SqliteQueue;
  use crate::submission::IncompleteSubmission;
  use color_eyre::eyre::eyre;
  use std::sync::Mutex;

  fn queue() -> SubmissionQueue<SqliteQueue> {
    SubmissionQueue::new(SqliteQueue::open_in_memory().unwrap())
  }

  fn form(q1: &str, q2: &str) -> RawForm {
    RawForm {
      question1: Some(q1.to_string()),
      question2: Some(q2.to_string()),
    }
  }

  /// Uploader double that records every payload it was handed.
  #[derive(Default)]
  struct RecordingUploader {
    payloads: Mutex<Vec<Value>>,
  }

  impl RecordingUploader {
    fn calls(&self) -> usize {
      self.payloads.lock().unwrap().len()
    }

    fn payloads(&self) -> Vec<Value> {
      self.payloads.lock().unwrap().clone()
    }

    async fn accept<T: serde::Serialize>(&self, payload: T) -> Result<Value> {
      let value = serde_json::to_value(payload).unwrap();
      self.payloads.lock().unwrap().push(value);
      Ok(serde_json::json!({"status": "ok"}))
    }
  }

  #[tokio::test]
  async fn test_offline_capture_buffers_without_upload() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    let outcome = queue
      .capture(form("A", "B"), false, |s| uploader.accept(s))
      .await
      .unwrap();

    match outcome {
      CaptureOutcome::Buffered(stored) => {
        assert_eq!(stored.question1, "A");
        assert_eq!(stored.question2, "B");
      }
      other => panic!("expected buffered outcome, got {other:?}"),
    }
    assert_eq!(uploader.calls(), 0);
    assert_eq!(queue.pending_count().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_online_capture_uploads_without_buffering() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    let outcome = queue
      .capture(form("A", "B"), true, |s| uploader.accept(s))
      .await
      .unwrap();

    assert_eq!(outcome, CaptureOutcome::Uploaded);
    assert_eq!(uploader.calls(), 1);
    assert_eq!(queue.pending_count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_failed_direct_upload_is_not_buffered() {
    let queue = queue();

    let outcome = queue
      .capture(form("A", "B"), true, |_| async {
        Err(eyre!("connection refused"))
      })
      .await
      .unwrap();

    assert_eq!(outcome, CaptureOutcome::UploadFailed);
    assert_eq!(queue.pending_count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_incomplete_form_fails_before_any_side_effect() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    let err = queue
      .capture(
        RawForm {
          question1: Some("A".to_string()),
          question2: None,
        },
        true,
        |s| uploader.accept(s),
      )
      .await
      .unwrap_err();

    let incomplete = err.downcast_ref::<IncompleteSubmission>().unwrap();
    assert_eq!(incomplete.field(), "question2");
    assert_eq!(uploader.calls(), 0);
    assert_eq!(queue.pending_count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_sync_with_empty_queue_makes_no_calls() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    let report = queue.sync_pending(|s| uploader.accept(s)).await.unwrap();

    assert_eq!(report, SyncReport::default());
    assert_eq!(uploader.calls(), 0);
  }

  #[tokio::test]
  async fn test_sync_round_trip_empties_queue() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    queue
      .capture(form("A", "B"), false, |s| uploader.accept(s))
      .await
      .unwrap();

    let report = queue.sync_pending(|s| uploader.accept(s)).await.unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.retained, 0);
    assert_eq!(queue.pending_count().unwrap(), 0);

    let delivered = uploader.payloads();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0]["question1"], "A");
    assert_eq!(delivered[0]["question2"], "B");
    assert!(delivered[0]["timestamp"].is_string());
    assert!(delivered[0]["id"].is_i64());
  }

  #[tokio::test]
  async fn test_partial_sync_failure_retains_failed_record() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    let first = match queue
      .capture(form("A", "B"), false, |s| uploader.accept(s))
      .await
      .unwrap()
    {
      CaptureOutcome::Buffered(stored) => stored,
      other => panic!("expected buffered outcome, got {other:?}"),
    };
    queue
      .capture(form("C", "D"), false, |s| uploader.accept(s))
      .await
      .unwrap();

    // Endpoint that rejects the first record and accepts the second.
    let report = queue
      .sync_pending(|s| {
        let uploader = &uploader;
        async move {
          if s.question1 == "A" {
            Err(eyre!("server unreachable"))
          } else {
            uploader.accept(s).await
          }
        }
      })
      .await
      .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.retained, 1);

    // The retained record is the rejected one, kept under its original id.
    let remaining = queue.pending().unwrap();
    assert_eq!(remaining, vec![first]);
  }

  #[tokio::test]
  async fn test_second_cycle_delivers_previously_retained_record() {
    let queue = queue();
    let uploader = RecordingUploader::default();

    queue
      .capture(form("A", "B"), false, |s| uploader.accept(s))
      .await
      .unwrap();

    let failed = queue
      .sync_pending(|_| async { Err(eyre!("still down")) })
      .await
      .unwrap();
    assert_eq!(failed.retained, 1);
    assert_eq!(queue.pending_count().unwrap(), 1);

    let recovered = queue.sync_pending(|s| uploader.accept(s)).await.unwrap();
    assert_eq!(recovered.delivered, 1);
    assert_eq!(queue.pending_count().unwrap(), 0);
  }
}
