//! Physical-file download handler.
//!
//! Serves the on-disk files the ingest engine stored:
//! `<root>/<subject code>/<physical name>` for subject documents and
//! `<root>/<ledger dir>/<file name>` for ledger documents.

use std::path::PathBuf;

use axum::{
  extract::{Path, State},
  http::header,
  response::{IntoResponse, Response},
};

use bursa_core::store::IngestStore;

use crate::{ApiState, error::ApiError};

/// `GET /files/:source/:id` where `source` is `documents` or `ledger`.
pub async fn download<S>(
  State(state): State<ApiState<S>>,
  Path((source, id)): Path<(String, i64)>,
) -> Result<Response, ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (file_name, path) = locate(&state, &source, id).await?;

  let bytes = tokio::fs::read(&path).await.map_err(|_| {
    ApiError::NotFound(format!("file missing on disk: {file_name}"))
  })?;

  Ok(
    (
      [
        (header::CONTENT_TYPE, "application/pdf".to_owned()),
        (
          header::CONTENT_DISPOSITION,
          format!("attachment; filename=\"{file_name}\""),
        ),
      ],
      bytes,
    )
      .into_response(),
  )
}

async fn locate<S>(
  state: &ApiState<S>,
  source: &str,
  id: i64,
) -> Result<(String, PathBuf), ApiError>
where
  S: IngestStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  match source {
    "documents" => {
      let record = state
        .store
        .get_document(id)
        .await
        .map_err(|e| ApiError::Store(Box::new(e)))?
        .ok_or_else(|| {
          ApiError::NotFound(format!("document record {id} not found"))
        })?;

      // Unchanged rows carry no physical name; the file on disk still has
      // the logical one.
      let name = record
        .physical_name
        .unwrap_or_else(|| record.logical_name.clone());
      let path = state
        .files
        .storage_root
        .join(&record.subject_code)
        .join(&name);
      Ok((name, path))
    }
    "ledger" => {
      let record = state
        .store
        .get_token(id)
        .await
        .map_err(|e| ApiError::Store(Box::new(e)))?
        .ok_or_else(|| {
          ApiError::NotFound(format!("ledger record {id} not found"))
        })?;

      let path = state
        .files
        .storage_root
        .join(&state.files.ledger_dir)
        .join(&record.file_name);
      Ok((record.file_name, path))
    }
    other => Err(ApiError::BadRequest(format!(
      "unknown source {other:?}, use 'documents' or 'ledger'"
    ))),
  }
}
