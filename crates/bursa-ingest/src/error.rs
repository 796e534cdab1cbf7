//! Error taxonomy for the ingestion engine.
//!
//! Per-item failures (`Transport`, `Reconcile`, `Extraction`) never propagate
//! past the crawler's per-item boundary — they are captured into the batch
//! report. `SessionFatal` is recovered in place by recreating the browsing
//! session. Only `Setup` aborts a whole batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Both download strategies exhausted for one URL.
  #[error("transport failure for {url}: {reason}")]
  Transport { url: String, reason: String },

  /// The browsing engine itself crashed or stopped responding.
  #[error("browsing session fatal: {0}")]
  SessionFatal(String),

  /// Staging, digest, or move I/O failed while reconciling one document.
  #[error("reconciliation failure: {0}")]
  Reconcile(#[source] std::io::Error),

  /// The page lacked the expected structure.
  #[error("source structure failure: {0}")]
  Extraction(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// Unrecoverable initialisation failure (directories, transport,
  /// browser launch). The only class that aborts a batch.
  #[error("setup failure: {0}")]
  Setup(String),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
