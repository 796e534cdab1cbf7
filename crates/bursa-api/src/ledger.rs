//! Handler for the `/ledger` endpoint.

use axum::{extract::State, Json};

use bursa_core::{ledger::TokenRecord, store::IngestStore};

use crate::{ApiState, error::ApiError};

/// `GET /ledger` — every token record, newest first.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<TokenRecord>>, ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let records = state
    .store
    .list_tokens()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(records))
}
