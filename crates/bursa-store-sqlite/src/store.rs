//! [`SqliteStore`] — the SQLite implementation of [`IngestStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use bursa_core::{
  ledger::{NewTokenRecord, TokenRecord},
  record::{DocumentRecord, NewDocumentRecord},
  store::IngestStore,
  subject::Subject,
};

use crate::{
  encode::{encode_dt, encode_state, RawDocument, RawSubject, RawToken},
  schema::SCHEMA,
  Error, Result,
};

const DOCUMENT_COLUMNS: &str = "record_id, subject_code, logical_name, \
   physical_name, origin_url, downloaded, attempted_at, digest, state";

const TOKEN_COLUMNS: &str = "record_id, entity, source_date, reference, \
   token, file_name, downloaded, registered_at";

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    record_id:     row.get(0)?,
    subject_code:  row.get(1)?,
    logical_name:  row.get(2)?,
    physical_name: row.get(3)?,
    origin_url:    row.get(4)?,
    downloaded:    row.get(5)?,
    attempted_at:  row.get(6)?,
    digest:        row.get(7)?,
    state:         row.get(8)?,
  })
}

fn token_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawToken> {
  Ok(RawToken {
    record_id:     row.get(0)?,
    entity:        row.get(1)?,
    source_date:   row.get(2)?,
    reference:     row.get(3)?,
    token:         row.get(4)?,
    file_name:     row.get(5)?,
    downloaded:    row.get(6)?,
    registered_at: row.get(7)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A bursa ingestion store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── IngestStore impl ────────────────────────────────────────────────────────

impl IngestStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn upsert_subject(&self, subject: Subject) -> Result<()> {
    let scanned_str = subject.last_scanned.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (code, name, sector, profile_url, processed, last_scanned)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(code) DO UPDATE SET
             name         = excluded.name,
             sector       = excluded.sector,
             profile_url  = excluded.profile_url,
             processed    = excluded.processed,
             last_scanned = excluded.last_scanned",
          rusqlite::params![
            subject.code,
            subject.name,
            subject.sector,
            subject.profile_url,
            subject.processed,
            scanned_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_subject(&self, code: &str) -> Result<Option<Subject>> {
    let code = code.to_owned();

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT code, name, sector, profile_url, processed, last_scanned
             FROM subjects WHERE code = ?1",
            rusqlite::params![code],
            |row| {
              Ok(RawSubject {
                code:         row.get(0)?,
                name:         row.get(1)?,
                sector:       row.get(2)?,
                profile_url:  row.get(3)?,
                processed:    row.get(4)?,
                last_scanned: row.get(5)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT code, name, sector, profile_url, processed, last_scanned
           FROM subjects ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSubject {
              code:         row.get(0)?,
              name:         row.get(1)?,
              sector:       row.get(2)?,
              profile_url:  row.get(3)?,
              processed:    row.get(4)?,
              last_scanned: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Document records — append-only writes ─────────────────────────────────

  async fn record_document(
    &self,
    input: NewDocumentRecord,
  ) -> Result<DocumentRecord> {
    let attempted_at = Utc::now();
    let at_str       = encode_dt(attempted_at);
    let state_str    = encode_state(input.state).to_owned();
    let row          = input.clone();

    let record_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (
             subject_code, logical_name, physical_name, origin_url,
             downloaded, attempted_at, digest, state
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            row.subject_code,
            row.logical_name,
            row.physical_name,
            row.origin_url,
            row.downloaded,
            at_str,
            row.digest,
            state_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(DocumentRecord {
      record_id,
      subject_code: input.subject_code,
      logical_name: input.logical_name,
      physical_name: input.physical_name,
      origin_url: input.origin_url,
      downloaded: input.downloaded,
      attempted_at,
      digest: input.digest,
      state: input.state,
    })
  }

  async fn latest_successful(
    &self,
    subject_code: &str,
    logical_name: &str,
  ) -> Result<Option<DocumentRecord>> {
    let code = subject_code.to_owned();
    let name = logical_name.to_owned();

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {DOCUMENT_COLUMNS} FROM documents
               WHERE subject_code = ?1 AND logical_name = ?2
                 AND downloaded = 1 AND state IN ('new', 'updated')
               ORDER BY attempted_at DESC, record_id DESC
               LIMIT 1"
            ),
            rusqlite::params![code, name],
            document_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDocument::into_record).transpose()
  }

  // ── Document records — reads ──────────────────────────────────────────────

  async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents
           ORDER BY attempted_at DESC, record_id DESC"
        ))?;
        let rows = stmt
          .query_map([], document_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_record).collect()
  }

  async fn documents_for_subject(
    &self,
    subject_code: &str,
  ) -> Result<Vec<DocumentRecord>> {
    let code = subject_code.to_owned();

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents
           WHERE subject_code = ?1
           ORDER BY attempted_at DESC, record_id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![code], document_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_record).collect()
  }

  async fn get_document(&self, record_id: i64) -> Result<Option<DocumentRecord>> {
    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE record_id = ?1"
            ),
            rusqlite::params![record_id],
            document_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDocument::into_record).transpose()
  }

  // ── Token ledger ──────────────────────────────────────────────────────────

  async fn token_exists(&self, token: &str) -> Result<bool> {
    let token = token.to_owned();

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM token_records WHERE token = ?1",
            rusqlite::params![token],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;

    Ok(exists)
  }

  async fn record_token(&self, input: NewTokenRecord) -> Result<TokenRecord> {
    let registered_at = Utc::now();
    let at_str        = encode_dt(registered_at);
    let row           = input.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO token_records (
             entity, source_date, reference, token,
             file_name, downloaded, registered_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            row.entity,
            row.source_date,
            row.reference,
            row.token,
            row.file_name,
            row.downloaded,
            at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await;

    let record_id = match inserted {
      Ok(id) => id,
      Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        f,
        _,
      ))) if f.code == rusqlite::ErrorCode::ConstraintViolation => {
        return Err(Error::DuplicateToken(input.token));
      }
      Err(e) => return Err(e.into()),
    };

    Ok(TokenRecord {
      record_id,
      entity: input.entity,
      source_date: input.source_date,
      reference: input.reference,
      token: input.token,
      file_name: input.file_name,
      downloaded: input.downloaded,
      registered_at,
    })
  }

  async fn list_tokens(&self) -> Result<Vec<TokenRecord>> {
    let raws: Vec<RawToken> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TOKEN_COLUMNS} FROM token_records
           ORDER BY registered_at DESC, record_id DESC"
        ))?;
        let rows = stmt
          .query_map([], token_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawToken::into_record).collect()
  }

  async fn get_token(&self, record_id: i64) -> Result<Option<TokenRecord>> {
    let raw: Option<RawToken> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {TOKEN_COLUMNS} FROM token_records WHERE record_id = ?1"
            ),
            rusqlite::params![record_id],
            token_from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawToken::into_record).transpose()
  }
}
