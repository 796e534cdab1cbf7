//! The `IngestStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `bursa-store-sqlite`).
//! Higher layers (`bursa-ingest`, `bursa-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::{
  ledger::{NewTokenRecord, TokenRecord},
  record::{DocumentRecord, NewDocumentRecord},
  subject::Subject,
};

/// Abstraction over an ingestion store backend.
///
/// Document and token records are append-only: a download attempt always
/// creates a new row, never mutates an existing one. Subjects are the only
/// upserted entity.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IngestStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Insert or update a subject keyed by its code.
  fn upsert_subject(
    &self,
    subject: Subject,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve a subject by code. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// List all known subjects in listing-discovery order.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Document records — append-only writes ─────────────────────────────

  /// Record a download attempt and return the persisted row. The
  /// `attempted_at` timestamp is set by the store.
  fn record_document(
    &self,
    input: NewDocumentRecord,
  ) -> impl Future<Output = Result<DocumentRecord, Self::Error>> + Send + '_;

  /// The row defining the current digest for a (subject, logical name)
  /// slot: the latest successful row whose state is `New` or `Updated`.
  /// Rows with `Unchanged` or `Error` states never qualify.
  fn latest_successful<'a>(
    &'a self,
    subject_code: &'a str,
    logical_name: &'a str,
  ) -> impl Future<Output = Result<Option<DocumentRecord>, Self::Error>> + Send + 'a;

  // ── Document records — reads ──────────────────────────────────────────

  /// All document records, newest attempt first.
  fn list_documents(
    &self,
  ) -> impl Future<Output = Result<Vec<DocumentRecord>, Self::Error>> + Send + '_;

  /// Full attempt history for one subject, newest first.
  fn documents_for_subject<'a>(
    &'a self,
    subject_code: &'a str,
  ) -> impl Future<Output = Result<Vec<DocumentRecord>, Self::Error>> + Send + 'a;

  /// Retrieve one record by id. Returns `None` if not found.
  fn get_document(
    &self,
    record_id: i64,
  ) -> impl Future<Output = Result<Option<DocumentRecord>, Self::Error>> + Send + '_;

  // ── Token ledger ──────────────────────────────────────────────────────

  /// Whether a token has already been ingested. Existence alone is enough
  /// to skip re-processing.
  fn token_exists<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Register a token. The `registered_at` timestamp is set by the store.
  fn record_token(
    &self,
    input: NewTokenRecord,
  ) -> impl Future<Output = Result<TokenRecord, Self::Error>> + Send + '_;

  /// All token records, newest first.
  fn list_tokens(
    &self,
  ) -> impl Future<Output = Result<Vec<TokenRecord>, Self::Error>> + Send + '_;

  /// Retrieve one token record by id. Returns `None` if not found.
  fn get_token(
    &self,
    record_id: i64,
  ) -> impl Future<Output = Result<Option<TokenRecord>, Self::Error>> + Send + '_;
}
