//! Wired-up exam client: queue, uploader, probe, and status line.

use color_eyre::Result;

use crate::config::Config;
use crate::net::ConnectivityProbe;
use crate::queue::{CaptureOutcome, SubmissionQueue, SyncReport};
use crate::status::{self, StatusLine};
use crate::store::SqliteQueue;
use crate::submission::RawForm;
use crate::upload::UploadClient;

/// The concrete client the CLI drives.
///
/// Binds the submission queue to the real SQLite store and HTTP uploader,
/// routes captures by probed connectivity, and keeps the status line.
pub struct ExamClient {
  queue: SubmissionQueue<SqliteQueue>,
  uploader: UploadClient,
  probe: ConnectivityProbe,
  status: StatusLine,
}

impl ExamClient {
  pub fn new(config: &Config) -> Result<Self> {
    let queue = SubmissionQueue::new(SqliteQueue::open_at(&config.database_path()?)?);
    let uploader = UploadClient::new(&config.server.url)?;
    let probe = ConnectivityProbe::new(&config.server.url)?;

    Ok(Self {
      queue,
      uploader,
      probe,
      status: StatusLine::new(),
    })
  }

  /// Capture one submission, routing by current connectivity.
  pub async fn submit(&self, form: RawForm) -> Result<CaptureOutcome> {
    let online = self.probe.check().await.is_online();

    let uploader = self.uploader.clone();
    let outcome = self
      .queue
      .capture(form, online, |s| async move { uploader.upload(&s).await })
      .await?;

    match &outcome {
      CaptureOutcome::Buffered(_) => self.status.set(status::SAVED_OFFLINE),
      CaptureOutcome::Uploaded => self.status.set(status::UPLOADED),
      // Failed direct uploads are operator-log only; the status line
      // reflects successes.
      CaptureOutcome::UploadFailed => {}
    }

    Ok(outcome)
  }

  /// Deliver every buffered submission in one cycle.
  pub async fn sync_pending(&self) -> Result<SyncReport> {
    let report = self
      .queue
      .sync_pending(|s| {
        let uploader = self.uploader.clone();
        async move { uploader.upload(&s).await }
      })
      .await?;

    if report.delivered > 0 {
      self.status.set(status::SYNCED);
    }

    Ok(report)
  }

  pub fn pending_count(&self) -> Result<usize> {
    self.queue.pending_count()
  }
}
