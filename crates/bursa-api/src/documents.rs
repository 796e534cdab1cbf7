//! Handler for the `/documents` endpoint.

use axum::{extract::State, Json};

use bursa_core::{record::DocumentRecord, store::IngestStore};

use crate::{ApiState, error::ApiError};

/// `GET /documents` — every download attempt, newest first.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<DocumentRecord>>, ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let records = state
    .store
    .list_documents()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(records))
}
