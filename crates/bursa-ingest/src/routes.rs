//! Crawl trigger handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/crawl/subjects` | Listing discovery |
//! | `POST` | `/crawl/documents` | Full profile pass |
//! | `POST` | `/crawl/emissions` | Emissions-tables pass |
//! | `POST` | `/crawl/ledger` | Optional `?year=`, defaults to current |
//!
//! Every handler takes the crawl lock for its whole run, so at most one
//! browsing session exists per process.

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use chrono::Datelike as _;
use serde::Deserialize;
use serde_json::json;

use bursa_core::{
  report::{CrawlReport, LedgerSummary},
  store::IngestStore,
};

use crate::{
  crawler::{CrawlPolicy, Crawler, SiteConfig},
  download::DownloadChannel,
  session::ChromiumLauncher,
  transport::{DirectTransport, TransportConfig},
  vault::DocumentVault,
  AppState, Error,
};

// ─── Error shaping ───────────────────────────────────────────────────────────

/// Engine error carried out of a trigger handler.
pub struct RouteError(Error);

impl From<Error> for RouteError {
  fn from(e: Error) -> Self { Self(e) }
}

impl IntoResponse for RouteError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      Error::Setup(_) => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": self.0.to_string() }))).into_response()
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn build_crawler<S>(
  state: &AppState<S>,
) -> Result<Crawler<S, ChromiumLauncher>, Error>
where
  S: IngestStore + Clone,
{
  let ingest = &state.config.ingest;

  let vault = DocumentVault::open(
    ingest.staging_dir.clone(),
    ingest.storage_root.clone(),
  )
  .await?;
  let transport = DirectTransport::new(&TransportConfig::from_config(ingest))?;

  Ok(Crawler::new(
    (*state.store).clone(),
    vault,
    DownloadChannel::new(transport),
    ChromiumLauncher::from_config(ingest),
    SiteConfig::from_config(ingest),
    CrawlPolicy::from_config(ingest),
  ))
}

/// `POST /crawl/subjects`
pub async fn crawl_subjects<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<serde_json::Value>, RouteError>
where
  S: IngestStore + Clone,
{
  let _guard = state.crawl_lock.lock().await;
  let crawler = build_crawler(&state).await?;
  let discovered = crawler.discover_subjects().await?;
  Ok(Json(json!({ "discovered": discovered })))
}

/// `POST /crawl/documents`
pub async fn crawl_documents<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<CrawlReport>, RouteError>
where
  S: IngestStore + Clone,
{
  let _guard = state.crawl_lock.lock().await;
  let crawler = build_crawler(&state).await?;
  Ok(Json(crawler.process_subjects().await?))
}

/// `POST /crawl/emissions`
pub async fn crawl_emissions<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<CrawlReport>, RouteError>
where
  S: IngestStore + Clone,
{
  let _guard = state.crawl_lock.lock().await;
  let crawler = build_crawler(&state).await?;
  Ok(Json(crawler.harvest_emission_tables().await?))
}

#[derive(Debug, Deserialize)]
pub struct LedgerParams {
  pub year: Option<i32>,
}

/// `POST /crawl/ledger[?year=<yyyy>]`
pub async fn crawl_ledger<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<LedgerParams>,
) -> Result<Json<LedgerSummary>, RouteError>
where
  S: IngestStore + Clone,
{
  let year = params.year.unwrap_or_else(|| chrono::Utc::now().year());

  let _guard = state.crawl_lock.lock().await;
  let crawler = build_crawler(&state).await?;
  Ok(Json(crawler.ingest_ledger(year).await?))
}
