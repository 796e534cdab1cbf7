//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Document states are stored
//! as lowercase discriminants matching their serde representation.

use chrono::{DateTime, Utc};

use bursa_core::{
  ledger::TokenRecord,
  record::{DocumentRecord, DocumentState},
  subject::Subject,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── DocumentState ───────────────────────────────────────────────────────────

pub fn encode_state(s: DocumentState) -> &'static str {
  match s {
    DocumentState::New => "new",
    DocumentState::Updated => "updated",
    DocumentState::Unchanged => "unchanged",
    DocumentState::Error => "error",
  }
}

pub fn decode_state(s: &str) -> Result<DocumentState> {
  match s {
    "new" => Ok(DocumentState::New),
    "updated" => Ok(DocumentState::Updated),
    "unchanged" => Ok(DocumentState::Unchanged),
    "error" => Ok(DocumentState::Error),
    other => {
      Err(bursa_core::Error::UnknownDocumentState(other.to_owned()).into())
    }
  }
}

// ─── Row carriers ────────────────────────────────────────────────────────────

/// A subjects row as it comes off the wire, before timestamp decoding.
pub struct RawSubject {
  pub code:         String,
  pub name:         String,
  pub sector:       String,
  pub profile_url:  String,
  pub processed:    bool,
  pub last_scanned: Option<String>,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      code:         self.code,
      name:         self.name,
      sector:       self.sector,
      profile_url:  self.profile_url,
      processed:    self.processed,
      last_scanned: self.last_scanned.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// A documents row before state/timestamp decoding.
pub struct RawDocument {
  pub record_id:     i64,
  pub subject_code:  String,
  pub logical_name:  String,
  pub physical_name: Option<String>,
  pub origin_url:    String,
  pub downloaded:    bool,
  pub attempted_at:  String,
  pub digest:        Option<String>,
  pub state:         String,
}

impl RawDocument {
  pub fn into_record(self) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
      record_id:     self.record_id,
      subject_code:  self.subject_code,
      logical_name:  self.logical_name,
      physical_name: self.physical_name,
      origin_url:    self.origin_url,
      downloaded:    self.downloaded,
      attempted_at:  decode_dt(&self.attempted_at)?,
      digest:        self.digest,
      state:         decode_state(&self.state)?,
    })
  }
}

/// A token_records row before timestamp decoding.
pub struct RawToken {
  pub record_id:     i64,
  pub entity:        String,
  pub source_date:   String,
  pub reference:     String,
  pub token:         String,
  pub file_name:     String,
  pub downloaded:    bool,
  pub registered_at: String,
}

impl RawToken {
  pub fn into_record(self) -> Result<TokenRecord> {
    Ok(TokenRecord {
      record_id:     self.record_id,
      entity:        self.entity,
      source_date:   self.source_date,
      reference:     self.reference,
      token:         self.token,
      file_name:     self.file_name,
      downloaded:    self.downloaded,
      registered_at: decode_dt(&self.registered_at)?,
    })
  }
}
