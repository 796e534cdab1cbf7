//! Handlers for `/subjects` endpoints.

use axum::{
  extract::{Path, State},
  Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use bursa_core::{
  record::DocumentRecord, store::IngestStore, subject::Subject,
};

use crate::{ApiState, error::ApiError};

/// `GET /subjects`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subjects = state
    .store
    .list_subjects()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(subjects))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

/// A subject together with its full download history, newest first.
#[derive(Debug, Serialize)]
pub struct SubjectDetail {
  pub code:         String,
  pub name:         String,
  pub sector:       String,
  pub profile_url:  String,
  pub processed:    bool,
  pub last_scanned: Option<DateTime<Utc>>,
  pub documents:    Vec<DocumentRecord>,
}

/// `GET /subjects/:code`
pub async fn detail<S>(
  State(state): State<ApiState<S>>,
  Path(code): Path<String>,
) -> Result<Json<SubjectDetail>, ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subject = state
    .store
    .get_subject(&code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("subject {code} not found")))?;

  let documents = state
    .store
    .documents_for_subject(&code)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  Ok(Json(SubjectDetail {
    code:         subject.code,
    name:         subject.name,
    sector:       subject.sector,
    profile_url:  subject.profile_url,
    processed:    subject.processed,
    last_scanned: subject.last_scanned,
    documents,
  }))
}
