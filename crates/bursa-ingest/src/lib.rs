//! Document ingestion and reconciliation engine for bursa.
//!
//! Drives a resilient crawl over two source portals, fetches documents
//! through a dual-channel download strategy (in-session fetch with a direct
//! HTTP fallback reusing session cookies), and reconciles each fetched
//! document against versioned on-disk storage with an append-only audit
//! trail in any [`IngestStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod crawler;
pub mod download;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod ledger;
pub mod routes;
pub mod session;
pub mod transport;
pub mod vault;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{routing::post, Router};
use serde::Deserialize;
use tokio::sync::Mutex;

use bursa_core::store::IngestStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub ingest:     IngestConfig,
}

/// Crawl, transport, and storage knobs. Every field has a production
/// default so a minimal `config.toml` only needs the server section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  /// Staging area for in-flight downloads; never exposed externally.
  pub staging_dir:          PathBuf,
  /// Root of the final storage tree (`<root>/<subject code>/<file>`).
  pub storage_root:         PathBuf,

  /// Portal base used to resolve relative document links.
  pub base_url:             String,
  /// Market-participant listing page.
  pub listing_url:          String,
  /// URL fragment identifying the emissions download API.
  pub emission_api_fragment: String,

  /// Publications list of the token-ledger source.
  pub ledger_list_url:      String,
  /// Base for resolving the ledger's relative viewer links.
  pub ledger_base_url:      String,
  /// Directory under the storage root holding ledger documents.
  pub ledger_dir:           String,
  /// Entity label and filename prefix for ledger records.
  pub ledger_prefix:        String,

  pub user_agent:           String,
  pub page_load_timeout_secs: u64,
  pub script_timeout_secs:  u64,
  /// Pause after navigation before reading the DOM, letting client-side
  /// rendering settle.
  pub page_settle_ms:       u64,
  pub connect_timeout_secs: u64,

  /// Base inter-item delay; a random jitter of up to `jitter_ms` is added.
  pub base_delay_ms:        u64,
  pub jitter_ms:            u64,
  /// Pause before resuming after a browsing-session restart.
  pub restart_pause_ms:     u64,
  /// How many times the browsing session may be recreated for the same
  /// item before the item is recorded as an error and skipped.
  pub max_session_restarts: u32,

  /// The production portals serve self-signed/legacy certificates; both
  /// flags are deliberate, auditable opt-ins rather than silent defaults.
  pub accept_invalid_certs: bool,
  /// Pin the direct transport to TLS 1.2 — modern default negotiation
  /// fails the handshake against the ledger source.
  pub pin_legacy_tls:       bool,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      staging_dir:          PathBuf::from("staging"),
      storage_root:         PathBuf::from("downloads"),
      base_url:             "https://www2.bbv.com.bo".into(),
      listing_url:          "https://www2.bbv.com.bo/participantes-del-mercado/"
        .into(),
      emission_api_fragment: "api/cargaArchivos/descargarprospecto".into(),
      ledger_list_url:
        "https://appweb2.asfi.gob.bo/PaginasPublicas2/VistaHechosRelevantes/ListaPublicacionHechoRelevante.aspx"
          .into(),
      ledger_base_url:
        "https://appweb2.asfi.gob.bo/PaginasPublicas2/VistaHechosRelevantes/"
          .into(),
      ledger_dir:           "ASFI_HechosRelevantes".into(),
      ledger_prefix:        "ASFI".into(),
      user_agent:
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
          .into(),
      page_load_timeout_secs: 60,
      script_timeout_secs:  60,
      page_settle_ms:       2000,
      connect_timeout_secs: 60,
      base_delay_ms:        1000,
      jitter_ms:            1000,
      restart_pause_ms:     3000,
      max_session_restarts: 3,
      accept_invalid_certs: true,
      pin_legacy_tls:       true,
    }
  }
}

impl IngestConfig {
  pub fn page_load_timeout(&self) -> Duration {
    Duration::from_secs(self.page_load_timeout_secs)
  }

  pub fn script_timeout(&self) -> Duration {
    Duration::from_secs(self.script_timeout_secs)
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_secs(self.connect_timeout_secs)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
///
/// `crawl_lock` serialises crawl runs: the browsing session and its cookie
/// jar are a single shared mutable resource, so at most one session may be
/// active per process.
#[derive(Clone)]
pub struct AppState<S: IngestStore> {
  pub store:      Arc<S>,
  pub config:     Arc<ServerConfig>,
  pub crawl_lock: Arc<Mutex<()>>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router: crawl triggers plus the read API nested
/// under `/api`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: IngestStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let files = bursa_api::FilesConfig {
    storage_root: state.config.ingest.storage_root.clone(),
    ledger_dir:   state.config.ingest.ledger_dir.clone(),
  };

  Router::new()
    .route("/crawl/subjects", post(routes::crawl_subjects::<S>))
    .route("/crawl/documents", post(routes::crawl_documents::<S>))
    .route("/crawl/emissions", post(routes::crawl_emissions::<S>))
    .route("/crawl/ledger", post(routes::crawl_ledger::<S>))
    .with_state(state.clone())
    .nest("/api", bursa_api::api_router(state.store.clone(), files))
}
