//! Error type for `bursa-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] bursa_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A token that the UNIQUE constraint already holds.
  #[error("token already registered: {0:?}")]
  DuplicateToken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
