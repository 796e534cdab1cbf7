//! Document records — the append-only audit trail of download attempts.
//!
//! A record is written for every attempt, whatever its outcome. Records are
//! never updated in place; the "current" content of a (subject, logical name)
//! slot is derived at query time from the latest successful row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Outcome state ───────────────────────────────────────────────────────────

/// How a fetched document compared against the last known copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
  /// First successful download for this slot.
  New,
  /// Content digest differs from the current record; a versioned physical
  /// file was written.
  Updated,
  /// Content digest matches the current record; nothing written.
  Unchanged,
  /// Download or storage failed; no physical file, no digest.
  Error,
}

impl DocumentState {
  /// Whether a row in this state defines the slot's current digest.
  pub fn defines_current(self) -> bool {
    matches!(self, Self::New | Self::Updated)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One download attempt, as persisted. `record_id` and `attempted_at` are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
  pub record_id:     i64,
  pub subject_code:  String,
  /// Stable identifier for the document slot (e.g. "Balance_2024.pdf").
  pub logical_name:  String,
  /// On-disk filename; carries a version suffix after the first update.
  /// Absent for error outcomes and unchanged outcomes.
  pub physical_name: Option<String>,
  pub origin_url:    String,
  pub downloaded:    bool,
  pub attempted_at:  DateTime<Utc>,
  /// Lowercase hex SHA-256 of the fetched bytes. Absent on error.
  pub digest:        Option<String>,
  pub state:         DocumentState,
}

/// Input for recording a download attempt.
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
  pub subject_code:  String,
  pub logical_name:  String,
  pub physical_name: Option<String>,
  pub origin_url:    String,
  pub downloaded:    bool,
  pub digest:        Option<String>,
  pub state:         DocumentState,
}

impl NewDocumentRecord {
  /// A failed attempt: nothing on disk, no digest.
  pub fn failure(
    subject_code: impl Into<String>,
    logical_name: impl Into<String>,
    origin_url: impl Into<String>,
  ) -> Self {
    Self {
      subject_code:  subject_code.into(),
      logical_name:  logical_name.into(),
      physical_name: None,
      origin_url:    origin_url.into(),
      downloaded:    false,
      digest:        None,
      state:         DocumentState::Error,
    }
  }
}
