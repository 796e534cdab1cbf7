//! Token ledger records — the cheaper reconciliation mode.
//!
//! Some sources issue a stable opaque token per publication and never change
//! the content behind a token. For those, the existence of the token in the
//! ledger is sufficient to skip re-processing; no digests, no versioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested publication, keyed by its source-issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
  pub record_id:     i64,
  /// Entity label as reported by the source listing.
  pub entity:        String,
  /// Publication date string as printed by the source (not parsed).
  pub source_date:   String,
  /// Free-text reference line from the listing row.
  pub reference:     String,
  /// Opaque download token, globally unique and immutable once issued.
  pub token:         String,
  /// Filename assigned on disk.
  pub file_name:     String,
  pub downloaded:    bool,
  pub registered_at: DateTime<Utc>,
}

/// Input for registering a token. `record_id` and `registered_at` are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTokenRecord {
  pub entity:      String,
  pub source_date: String,
  pub reference:   String,
  pub token:       String,
  pub file_name:   String,
  pub downloaded:  bool,
}
