//! Error types for `bursa-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(String),

  #[error("record not found: {0}")]
  RecordNotFound(i64),

  #[error("unknown document state: {0:?}")]
  UnknownDocumentState(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
