//! The storage reconciler.
//!
//! Given a logical document name, freshly downloaded bytes, and the owning
//! subject, decides NEW / UPDATED / UNCHANGED / ERROR, assigns the physical
//! filename, and performs the atomic move from staging into the final
//! storage tree (`<root>/<subject code>/<physical name>`). Every branch —
//! including errors — appends one [`DocumentRecord`] row, so the store holds
//! a full audit trail of attempts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use bursa_core::{
  record::{DocumentState, NewDocumentRecord},
  store::IngestStore,
};

use crate::{fingerprint, Error, Result};

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// What the reconciler decided for one fetched document.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub state:         DocumentState,
  pub physical_name: Option<String>,
  pub digest:        Option<String>,
}

impl Outcome {
  fn error() -> Self {
    Self {
      state:         DocumentState::Error,
      physical_name: None,
      digest:        None,
    }
  }
}

// ─── Vault ───────────────────────────────────────────────────────────────────

/// Staging area plus final storage tree.
#[derive(Debug, Clone)]
pub struct DocumentVault {
  staging: PathBuf,
  root:    PathBuf,
}

impl DocumentVault {
  /// Open the vault, creating both directories. A failure here is a setup
  /// failure — the batch cannot run without storage.
  pub async fn open(
    staging: impl Into<PathBuf>,
    root: impl Into<PathBuf>,
  ) -> Result<Self> {
    let staging = staging.into();
    let root = root.into();

    for dir in [&staging, &root] {
      fs::create_dir_all(dir).await.map_err(|e| {
        Error::Setup(format!("cannot create storage directory {dir:?}: {e}"))
      })?;
    }

    Ok(Self { staging, root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Reconcile one fetched document against the last known record for its
  /// (subject, logical name) slot.
  ///
  /// I/O failures resolve to an `Error` outcome (recorded, staged file
  /// removed best-effort) rather than an `Err` — the batch continues. Only
  /// store failures propagate.
  pub async fn reconcile<S>(
    &self,
    store: &S,
    subject_code: &str,
    logical_name: &str,
    bytes: &[u8],
    origin_url: &str,
  ) -> Result<Outcome>
  where
    S: IngestStore,
  {
    // 1. Stage under a unique suffix so concurrent attempts for the same
    //    logical name cannot collide.
    let staged = self
      .staging
      .join(format!("{logical_name}_{}.tmp", Utc::now().timestamp_millis()));

    if let Err(e) = fs::write(&staged, bytes).await {
      warn!(logical_name, "staging write failed: {e}");
      return self
        .record_error(store, subject_code, logical_name, origin_url)
        .await;
    }

    // 2. Digest the staged file (streaming; off the async runtime).
    let digest_path = staged.clone();
    let digest = tokio::task::spawn_blocking(move || {
      fingerprint::digest_file(&digest_path)
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))
    .and_then(|r| r);

    let digest = match digest {
      Ok(d) => d,
      Err(e) => {
        warn!(logical_name, "digest failed: {e}");
        self.discard(&staged).await;
        return self
          .record_error(store, subject_code, logical_name, origin_url)
          .await;
      }
    };

    // 3. Compare against the current record for this slot.
    let previous = store
      .latest_successful(subject_code, logical_name)
      .await
      .map_err(Error::store)?;

    let (state, physical_name) = match &previous {
      None => (DocumentState::New, logical_name.to_owned()),
      Some(prev) if prev.digest.as_deref() == Some(digest.as_str()) => {
        // Same content as the current version: nothing to write.
        self.discard(&staged).await;
        debug!(subject_code, logical_name, "unchanged");
        store
          .record_document(NewDocumentRecord {
            subject_code:  subject_code.to_owned(),
            logical_name:  logical_name.to_owned(),
            physical_name: None,
            origin_url:    origin_url.to_owned(),
            downloaded:    true,
            digest:        Some(digest.clone()),
            state:         DocumentState::Unchanged,
          })
          .await
          .map_err(Error::store)?;
        return Ok(Outcome {
          state:         DocumentState::Unchanged,
          physical_name: None,
          digest:        Some(digest),
        });
      }
      Some(_) => {
        (DocumentState::Updated, versioned_name(logical_name, Utc::now()))
      }
    };

    // 4. Move into the subject's directory; rename replaces the
    //    destination atomically on POSIX.
    if let Err(e) = self.promote(&staged, subject_code, &physical_name).await {
      warn!(logical_name, "move to final storage failed: {e}");
      self.discard(&staged).await;
      return self
        .record_error(store, subject_code, logical_name, origin_url)
        .await;
    }

    info!(subject_code, logical_name, physical_name, state = ?state, "stored");
    store
      .record_document(NewDocumentRecord {
        subject_code:  subject_code.to_owned(),
        logical_name:  logical_name.to_owned(),
        physical_name: Some(physical_name.clone()),
        origin_url:    origin_url.to_owned(),
        downloaded:    true,
        digest:        Some(digest.clone()),
        state,
      })
      .await
      .map_err(Error::store)?;

    Ok(Outcome {
      state,
      physical_name: Some(physical_name),
      digest: Some(digest),
    })
  }

  /// Write a document directly into a fixed directory under the root,
  /// replacing any existing file. Used by the token ledger, which assigns
  /// unique filenames and needs no staging round-trip.
  pub async fn store_fixed(
    &self,
    dir: &str,
    file_name: &str,
    bytes: &[u8],
  ) -> Result<()> {
    let target_dir = self.root.join(dir);
    fs::create_dir_all(&target_dir).await.map_err(Error::Reconcile)?;
    fs::write(target_dir.join(file_name), bytes)
      .await
      .map_err(Error::Reconcile)
  }

  async fn promote(
    &self,
    staged: &Path,
    subject_code: &str,
    physical_name: &str,
  ) -> std::io::Result<()> {
    let subject_dir = self.root.join(subject_code);
    fs::create_dir_all(&subject_dir).await?;
    fs::rename(staged, subject_dir.join(physical_name)).await
  }

  async fn discard(&self, staged: &Path) {
    if let Err(e) = fs::remove_file(staged).await {
      warn!("failed to remove staged file {staged:?}: {e}");
    }
  }

  async fn record_error<S>(
    &self,
    store: &S,
    subject_code: &str,
    logical_name: &str,
    origin_url: &str,
  ) -> Result<Outcome>
  where
    S: IngestStore,
  {
    store
      .record_document(NewDocumentRecord::failure(
        subject_code,
        logical_name,
        origin_url,
      ))
      .await
      .map_err(Error::store)?;
    Ok(Outcome::error())
  }
}

// ─── Versioned naming ────────────────────────────────────────────────────────

/// Insert a version suffix derived from `at` before the extension:
/// `Balance_2024.pdf` → `Balance_2024_v20260805_142501.pdf`. Extension-less
/// names get the suffix appended.
pub fn versioned_name(logical_name: &str, at: DateTime<Utc>) -> String {
  let stamp = at.format("%Y%m%d_%H%M%S");
  match logical_name.rfind('.') {
    Some(dot) => {
      format!(
        "{}_v{stamp}{}",
        &logical_name[..dot],
        &logical_name[dot..]
      )
    }
    None => format!("{logical_name}_v{stamp}"),
  }
}

#[cfg(test)]
mod tests {
  use bursa_core::record::DocumentState;
  use bursa_store_sqlite::SqliteStore;
  use chrono::TimeZone as _;

  use super::*;

  async fn vault() -> (DocumentVault, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let vault = DocumentVault::open(
      dir.path().join("staging"),
      dir.path().join("downloads"),
    )
    .await
    .unwrap();
    (vault, dir)
  }

  async fn store() -> SqliteStore {
    let s = SqliteStore::open_in_memory().await.unwrap();
    bursa_core::store::IngestStore::upsert_subject(
      &s,
      bursa_core::subject::Subject::discovered(
        "ABC",
        "Subject ABC",
        "Banking",
        "https://portal.example/profile?participante=ABC",
      ),
    )
    .await
    .unwrap();
    s
  }

  fn staged_files(vault: &DocumentVault) -> usize {
    std::fs::read_dir(&vault.staging).unwrap().count()
  }

  #[test]
  fn versioned_name_keeps_extension() {
    let at = chrono::Utc.with_ymd_and_hms(2026, 8, 5, 14, 25, 1).unwrap();
    assert_eq!(
      versioned_name("Balance_2024.pdf", at),
      "Balance_2024_v20260805_142501.pdf"
    );
  }

  #[test]
  fn versioned_name_appends_when_no_extension() {
    let at = chrono::Utc.with_ymd_and_hms(2026, 8, 5, 14, 25, 1).unwrap();
    assert_eq!(versioned_name("Prospectus", at), "Prospectus_v20260805_142501");
  }

  #[tokio::test]
  async fn first_download_is_new_under_logical_name() {
    let (vault, _dir) = vault().await;
    let s = store().await;

    let outcome = vault
      .reconcile(&s, "ABC", "Report.pdf", b"content-1", "https://x/Report.pdf")
      .await
      .unwrap();

    assert_eq!(outcome.state, DocumentState::New);
    assert_eq!(outcome.physical_name.as_deref(), Some("Report.pdf"));
    assert!(vault.root().join("ABC").join("Report.pdf").exists());
    assert_eq!(staged_files(&vault), 0);
  }

  #[tokio::test]
  async fn same_bytes_twice_is_new_then_unchanged() {
    let (vault, _dir) = vault().await;
    let s = store().await;

    let first = vault
      .reconcile(&s, "ABC", "Report.pdf", b"content-1", "https://x/Report.pdf")
      .await
      .unwrap();
    let second = vault
      .reconcile(&s, "ABC", "Report.pdf", b"content-1", "https://x/Report.pdf")
      .await
      .unwrap();

    assert_eq!(first.state, DocumentState::New);
    assert_eq!(second.state, DocumentState::Unchanged);
    assert!(second.physical_name.is_none());
    // Only the original physical file exists, staged copy removed.
    let entries: Vec<_> = std::fs::read_dir(vault.root().join("ABC"))
      .unwrap()
      .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(staged_files(&vault), 0);
  }

  #[tokio::test]
  async fn changed_bytes_yield_versioned_update() {
    let (vault, _dir) = vault().await;
    let s = store().await;

    vault
      .reconcile(&s, "ABC", "Report.pdf", b"content-1", "https://x/Report.pdf")
      .await
      .unwrap();
    let updated = vault
      .reconcile(&s, "ABC", "Report.pdf", b"content-2", "https://x/Report.pdf")
      .await
      .unwrap();

    assert_eq!(updated.state, DocumentState::Updated);
    let physical = updated.physical_name.unwrap();
    assert_ne!(physical, "Report.pdf");
    assert!(physical.starts_with("Report_v"));
    assert!(physical.ends_with(".pdf"));
    assert!(vault.root().join("ABC").join(&physical).exists());
    // The first version is still on disk.
    assert!(vault.root().join("ABC").join("Report.pdf").exists());
  }

  #[tokio::test]
  async fn every_branch_appends_an_audit_row() {
    let (vault, _dir) = vault().await;
    let s = store().await;

    for bytes in [&b"content-1"[..], b"content-1", b"content-2"] {
      vault
        .reconcile(&s, "ABC", "Report.pdf", bytes, "https://x/Report.pdf")
        .await
        .unwrap();
    }

    use bursa_core::store::IngestStore as _;
    let history = s.documents_for_subject("ABC").await.unwrap();
    assert_eq!(history.len(), 3);

    // The unchanged row observed the same digest but never became current.
    let current = s
      .latest_successful("ABC", "Report.pdf")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(current.state, DocumentState::Updated);
  }

  #[tokio::test]
  async fn store_fixed_writes_and_replaces() {
    let (vault, _dir) = vault().await;

    vault.store_fixed("ledger", "a.pdf", b"v1").await.unwrap();
    vault.store_fixed("ledger", "a.pdf", b"v2").await.unwrap();

    let stored = std::fs::read(vault.root().join("ledger").join("a.pdf")).unwrap();
    assert_eq!(stored, b"v2");
  }
}
