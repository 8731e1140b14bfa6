//! User-visible status line.
//!
//! Stands in for the exam page's status element: one line of text that only
//! ever reflects successes. The message texts are the ones the page showed.

use std::sync::Mutex;

pub const SAVED_OFFLINE: &str = "Offline. Response saved locally.";
pub const UPLOADED: &str = "Uploaded Successfully";
pub const SYNCED: &str = "Synced offline data";

/// Last status message shown to the submitter.
pub struct StatusLine {
  last: Mutex<Option<String>>,
  echo: bool,
}

impl StatusLine {
  /// Status line that prints each message to stdout.
  pub fn new() -> Self {
    Self {
      last: Mutex::new(None),
      echo: true,
    }
  }

  /// Status line that only records messages. Used by tests.
  #[allow(dead_code)]
  pub fn silent() -> Self {
    Self {
      last: Mutex::new(None),
      echo: false,
    }
  }

  pub fn set(&self, message: impl Into<String>) {
    let message = message.into();
    if self.echo {
      println!("{message}");
    }
    *self.last.lock().unwrap() = Some(message);
  }

  #[allow(dead_code)]
  pub fn last(&self) -> Option<String> {
    self.last.lock().unwrap().clone()
  }
}

impl Default for StatusLine {
  fn default() -> Self {
    Self::new()
  }
}
