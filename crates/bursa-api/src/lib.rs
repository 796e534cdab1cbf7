//! JSON read API for bursa.
//!
//! Exposes an axum [`Router`] backed by any [`bursa_core::store::IngestStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", bursa_api::api_router(store.clone(), files))
//! ```

pub mod documents;
pub mod error;
pub mod files;
pub mod ledger;
pub mod subjects;

use std::{path::PathBuf, sync::Arc};

use axum::{routing::get, Router};
use bursa_core::store::IngestStore;

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Where the physical files live, mirroring the ingest engine's layout.
#[derive(Debug, Clone)]
pub struct FilesConfig {
  pub storage_root: PathBuf,
  /// Directory under the root holding token-ledger documents.
  pub ledger_dir:   String,
}

/// Shared state threaded through all API handlers.
pub struct ApiState<S> {
  pub store: Arc<S>,
  pub files: Arc<FilesConfig>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), files: self.files.clone() }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, files: FilesConfig) -> Router<()>
where
  S: IngestStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let state = ApiState { store, files: Arc::new(files) };

  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>))
    .route("/subjects/{code}", get(subjects::detail::<S>))
    // Records
    .route("/documents", get(documents::list::<S>))
    .route("/ledger", get(ledger::list::<S>))
    // Physical files
    .route("/files/{source}/{id}", get(files::download::<S>))
    .with_state(state)
}
