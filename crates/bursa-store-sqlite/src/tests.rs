//! Integration tests for `SqliteStore` against an in-memory database.

use bursa_core::{
  ledger::NewTokenRecord,
  record::{DocumentState, NewDocumentRecord},
  store::IngestStore,
  subject::Subject,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn subject(code: &str) -> Subject {
  Subject::discovered(
    code,
    format!("Subject {code}"),
    "Banking",
    format!("https://portal.example/profile?participante={code}"),
  )
}

fn attempt(
  code: &str,
  logical: &str,
  digest: &str,
  state: DocumentState,
) -> NewDocumentRecord {
  NewDocumentRecord {
    subject_code:  code.to_owned(),
    logical_name:  logical.to_owned(),
    physical_name: Some(logical.to_owned()),
    origin_url:    format!("https://portal.example/files/{logical}"),
    downloaded:    true,
    digest:        Some(digest.to_owned()),
    state,
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_subject() {
  let s = store().await;

  s.upsert_subject(subject("ABC")).await.unwrap();

  let fetched = s.get_subject("ABC").await.unwrap().unwrap();
  assert_eq!(fetched.code, "ABC");
  assert_eq!(fetched.sector, "Banking");
  assert!(!fetched.processed);
  assert!(fetched.last_scanned.is_none());
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_overwrites_without_duplicating() {
  let s = store().await;

  s.upsert_subject(subject("ABC")).await.unwrap();

  let mut updated = subject("ABC");
  updated.name = "Renamed".into();
  updated.processed = true;
  updated.last_scanned = Some(chrono::Utc::now());
  s.upsert_subject(updated).await.unwrap();

  let all = s.list_subjects().await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].name, "Renamed");
  assert!(all[0].processed);
  assert!(all[0].last_scanned.is_some());
}

#[tokio::test]
async fn list_subjects_preserves_discovery_order() {
  let s = store().await;
  for code in ["ZZZ", "AAA", "MMM"] {
    s.upsert_subject(subject(code)).await.unwrap();
  }

  let codes: Vec<String> = s
    .list_subjects()
    .await
    .unwrap()
    .into_iter()
    .map(|x| x.code)
    .collect();
  assert_eq!(codes, ["ZZZ", "AAA", "MMM"]);
}

// ─── Document records ────────────────────────────────────────────────────────

#[tokio::test]
async fn record_document_assigns_id_and_timestamp() {
  let s = store().await;
  s.upsert_subject(subject("ABC")).await.unwrap();

  let rec = s
    .record_document(attempt("ABC", "Report.pdf", "d1", DocumentState::New))
    .await
    .unwrap();
  assert!(rec.record_id > 0);
  assert_eq!(rec.state, DocumentState::New);

  let fetched = s.get_document(rec.record_id).await.unwrap().unwrap();
  assert_eq!(fetched.logical_name, "Report.pdf");
  assert_eq!(fetched.digest.as_deref(), Some("d1"));
}

#[tokio::test]
async fn latest_successful_picks_newest_qualifying_row() {
  let s = store().await;
  s.upsert_subject(subject("ABC")).await.unwrap();

  s.record_document(attempt("ABC", "Report.pdf", "d1", DocumentState::New))
    .await
    .unwrap();
  s.record_document(attempt("ABC", "Report.pdf", "d2", DocumentState::Updated))
    .await
    .unwrap();

  let current = s
    .latest_successful("ABC", "Report.pdf")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(current.digest.as_deref(), Some("d2"));
  assert_eq!(current.state, DocumentState::Updated);
}

#[tokio::test]
async fn unchanged_and_error_rows_never_define_current() {
  let s = store().await;
  s.upsert_subject(subject("ABC")).await.unwrap();

  s.record_document(attempt("ABC", "Report.pdf", "d1", DocumentState::New))
    .await
    .unwrap();
  // An unchanged attempt re-observes d1 without writing a file.
  let mut unchanged = attempt("ABC", "Report.pdf", "d1", DocumentState::Unchanged);
  unchanged.physical_name = None;
  s.record_document(unchanged).await.unwrap();
  // A failed attempt records neither file nor digest.
  s.record_document(NewDocumentRecord::failure(
    "ABC",
    "Report.pdf",
    "https://portal.example/files/Report.pdf",
  ))
  .await
  .unwrap();

  let current = s
    .latest_successful("ABC", "Report.pdf")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(current.digest.as_deref(), Some("d1"));
  assert_eq!(current.state, DocumentState::New);
}

#[tokio::test]
async fn latest_successful_scoped_to_slot() {
  let s = store().await;
  s.upsert_subject(subject("ABC")).await.unwrap();
  s.upsert_subject(subject("XYZ")).await.unwrap();

  s.record_document(attempt("ABC", "Report.pdf", "d1", DocumentState::New))
    .await
    .unwrap();
  s.record_document(attempt("XYZ", "Report.pdf", "d2", DocumentState::New))
    .await
    .unwrap();
  s.record_document(attempt("ABC", "Other.pdf", "d3", DocumentState::New))
    .await
    .unwrap();

  let current = s
    .latest_successful("ABC", "Report.pdf")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(current.digest.as_deref(), Some("d1"));
  assert!(
    s.latest_successful("ABC", "Missing.pdf")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn history_is_append_only() {
  let s = store().await;
  s.upsert_subject(subject("ABC")).await.unwrap();

  for (digest, state) in [
    ("d1", DocumentState::New),
    ("d1", DocumentState::Unchanged),
    ("d2", DocumentState::Updated),
  ] {
    s.record_document(attempt("ABC", "Report.pdf", digest, state))
      .await
      .unwrap();
  }

  let history = s.documents_for_subject("ABC").await.unwrap();
  assert_eq!(history.len(), 3);
  // Newest first.
  assert_eq!(history[0].state, DocumentState::Updated);
}

// ─── Token ledger ────────────────────────────────────────────────────────────

fn token_input(token: &str) -> NewTokenRecord {
  NewTokenRecord {
    entity:      "REGULATOR".into(),
    source_date: "05/03/2026".into(),
    reference:   "Relevant event publication".into(),
    token:       token.to_owned(),
    file_name:   format!("REG_05-03-2026_{token}.pdf"),
    downloaded:  true,
  }
}

#[tokio::test]
async fn token_exists_after_recording() {
  let s = store().await;

  assert!(!s.token_exists("tok-1").await.unwrap());
  s.record_token(token_input("tok-1")).await.unwrap();
  assert!(s.token_exists("tok-1").await.unwrap());
}

#[tokio::test]
async fn duplicate_token_is_rejected() {
  let s = store().await;

  s.record_token(token_input("tok-1")).await.unwrap();
  let err = s.record_token(token_input("tok-1")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateToken(t) if t == "tok-1"));
}

#[tokio::test]
async fn list_tokens_newest_first() {
  let s = store().await;

  s.record_token(token_input("tok-1")).await.unwrap();
  s.record_token(token_input("tok-2")).await.unwrap();

  let all = s.list_tokens().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].token, "tok-2");

  let one = s.get_token(all[1].record_id).await.unwrap().unwrap();
  assert_eq!(one.token, "tok-1");
}
