//! Submission data model and form validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw answers as captured from the command line, before validation.
///
/// Either field may be missing; `validate` turns this into a checked
/// answer set or a named error.
#[derive(Debug, Clone, Default)]
pub struct RawForm {
  pub question1: Option<String>,
  pub question2: Option<String>,
}

impl RawForm {
  /// Validate that both questions were answered.
  pub fn validate(self) -> Result<Answers, IncompleteSubmission> {
    let question1 = self
      .question1
      .ok_or(IncompleteSubmission { field: "question1" })?;
    let question2 = self
      .question2
      .ok_or(IncompleteSubmission { field: "question2" })?;

    Ok(Answers {
      question1,
      question2,
    })
  }
}

/// A validated answer set, not yet stamped or stored.
#[derive(Debug, Clone)]
pub struct Answers {
  pub question1: String,
  pub question2: String,
}

impl Answers {
  /// Stamp the answers with the current UTC time, producing the payload
  /// for a direct upload or a queue insert.
  pub fn stamped(self) -> NewSubmission {
    self.stamped_at(Utc::now())
  }

  pub fn stamped_at(self, timestamp: DateTime<Utc>) -> NewSubmission {
    NewSubmission {
      question1: self.question1,
      question2: self.question2,
      timestamp,
    }
  }
}

/// A captured submission before it has a queue id.
///
/// This is the wire shape for direct uploads: `{question1, question2,
/// timestamp}` with the timestamp in ISO 8601.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubmission {
  pub question1: String,
  pub question2: String,
  pub timestamp: DateTime<Utc>,
}

/// A locally buffered submission, keyed by the id the store assigned.
///
/// The wire shape for synced uploads additionally carries `id`; the server
/// ignores the extra field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
  pub id: i64,
  pub question1: String,
  pub question2: String,
  pub timestamp: DateTime<Utc>,
}

/// Error for a submission attempted with an unanswered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteSubmission {
  field: &'static str,
}

impl IncompleteSubmission {
  /// Which question was left unanswered.
  pub fn field(&self) -> &'static str {
    self.field
  }
}

impl std::fmt::Display for IncompleteSubmission {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "incomplete submission: no option selected for {}", self.field)
  }
}

impl std::error::Error for IncompleteSubmission {}

#[cfg(test)]
mod tests {
  use super::*;

  fn filled() -> RawForm {
    RawForm {
      question1: Some("A".to_string()),
      question2: Some("B".to_string()),
    }
  }

  #[test]
  fn test_validate_complete_form() {
    let answers = filled().validate().unwrap();
    assert_eq!(answers.question1, "A");
    assert_eq!(answers.question2, "B");
  }

  #[test]
  fn test_validate_missing_first_answer() {
    let form = RawForm {
      question1: None,
      ..filled()
    };
    let err = form.validate().unwrap_err();
    assert_eq!(err.field(), "question1");
  }

  #[test]
  fn test_validate_missing_second_answer() {
    let form = RawForm {
      question2: None,
      ..filled()
    };
    let err = form.validate().unwrap_err();
    assert_eq!(err.field(), "question2");
  }

  #[test]
  fn test_direct_payload_has_no_id() {
    let payload = filled().validate().unwrap().stamped();
    let value = serde_json::to_value(&payload).unwrap();
    assert!(value.get("id").is_none());
    assert_eq!(value["question1"], "A");
    assert_eq!(value["question2"], "B");
    assert!(value["timestamp"].is_string());
  }

  #[test]
  fn test_synced_payload_includes_id() {
    let pending = PendingSubmission {
      id: 7,
      question1: "A".to_string(),
      question2: "B".to_string(),
      timestamp: Utc::now(),
    };
    let value = serde_json::to_value(&pending).unwrap();
    assert_eq!(value["id"], 7);
  }

  #[test]
  fn test_timestamp_serializes_as_iso8601() {
    let stamp = "2024-05-01T10:30:00Z".parse::<DateTime<Utc>>().unwrap();
    let payload = filled().validate().unwrap().stamped_at(stamp);
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["timestamp"], "2024-05-01T10:30:00Z");
  }
}
