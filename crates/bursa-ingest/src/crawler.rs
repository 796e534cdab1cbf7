//! The session controller.
//!
//! Drives a resilient, strictly sequential iteration over subjects,
//! invoking site extraction and the reconciler per document, and recovering
//! from session-fatal faults by discarding and recreating the browsing
//! session without losing the current position. A batch always runs to
//! completion and returns a [`CrawlReport`]; per-item failures become report
//! entries, never propagated faults.

use std::{collections::HashSet, time::Duration};

use chrono::Utc;
use rand::Rng as _;
use tracing::{debug, error, info, warn};

use bursa_core::{
  record::{DocumentState, NewDocumentRecord},
  report::CrawlReport,
  store::IngestStore,
  subject::Subject,
};

use crate::{
  download::DownloadChannel,
  extract::{self, DocumentCandidate},
  session::{BrowserSession, SessionLauncher},
  vault::DocumentVault,
  Error, IngestConfig, Result,
};

const PRIMARY_CONTAINER: &str = "emisores-content";
const OTHER_CONTAINER: &str = "otros-content";

/// The "other participants" container ships collapsed; force it visible
/// before snapshotting the DOM.
const REVEAL_OTHER_CONTAINER: &str =
  "document.getElementById('otros-content').style.display = 'block';";

// ─── Policy & site knobs ─────────────────────────────────────────────────────

/// Pacing and resilience knobs. Delays are politeness policy, not
/// correctness requirements.
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
  pub page_settle:          Duration,
  pub base_delay:           Duration,
  pub jitter:               Duration,
  pub restart_pause:        Duration,
  pub max_session_restarts: u32,
}

impl CrawlPolicy {
  pub fn from_config(config: &IngestConfig) -> Self {
    Self {
      page_settle:          Duration::from_millis(config.page_settle_ms),
      base_delay:           Duration::from_millis(config.base_delay_ms),
      jitter:               Duration::from_millis(config.jitter_ms),
      restart_pause:        Duration::from_millis(config.restart_pause_ms),
      max_session_restarts: config.max_session_restarts,
    }
  }
}

/// Source-portal addresses and fragments.
#[derive(Debug, Clone)]
pub struct SiteConfig {
  pub base_url:              String,
  pub listing_url:           String,
  pub emission_api_fragment: String,
  pub ledger_list_url:       String,
  pub ledger_base_url:       String,
  pub ledger_dir:            String,
  pub ledger_prefix:         String,
}

impl SiteConfig {
  pub fn from_config(config: &IngestConfig) -> Self {
    Self {
      base_url:              config.base_url.clone(),
      listing_url:           config.listing_url.clone(),
      emission_api_fragment: config.emission_api_fragment.clone(),
      ledger_list_url:       config.ledger_list_url.clone(),
      ledger_base_url:       config.ledger_base_url.clone(),
      ledger_dir:            config.ledger_dir.clone(),
      ledger_prefix:         config.ledger_prefix.clone(),
    }
  }
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Resumable position in a batch.
///
/// The index only moves forward when an item is finished (successfully or
/// not), so a session restart retries the same item instead of skipping it
/// or starting over. The per-item fault counter bounds how many restarts
/// one item may consume.
#[derive(Debug)]
pub(crate) struct Cursor {
  index:  usize,
  len:    usize,
  faults: u32,
}

impl Cursor {
  pub(crate) fn new(len: usize) -> Self {
    Self { index: 0, len, faults: 0 }
  }

  pub(crate) fn current(&self) -> Option<usize> {
    (self.index < self.len).then_some(self.index)
  }

  pub(crate) fn advance(&mut self) {
    self.index += 1;
    self.faults = 0;
  }

  /// Note a session-fatal fault at the current item. Returns `true` once
  /// the restart budget for this item is exhausted.
  pub(crate) fn fault_budget_exhausted(&mut self, max_restarts: u32) -> bool {
    self.faults += 1;
    self.faults > max_restarts
  }
}

// ─── Crawler ─────────────────────────────────────────────────────────────────

/// Which candidate set a document pass extracts per subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
  /// All direct PDF links across the known profile sections.
  FullProfile,
  /// Only the emissions tables' download-API links.
  EmissionsOnly,
}

/// The batch driver: one browsing session at a time, subjects in
/// source-list order.
pub struct Crawler<S, L> {
  pub(crate) store:    S,
  pub(crate) vault:    DocumentVault,
  pub(crate) channel:  DownloadChannel,
  pub(crate) launcher: L,
  pub(crate) sites:    SiteConfig,
  pub(crate) policy:   CrawlPolicy,
}

impl<S, L> Crawler<S, L>
where
  S: IngestStore,
  L: SessionLauncher,
{
  pub fn new(
    store: S,
    vault: DocumentVault,
    channel: DownloadChannel,
    launcher: L,
    sites: SiteConfig,
    policy: CrawlPolicy,
  ) -> Self {
    Self { store, vault, channel, launcher, sites, policy }
  }

  // ── Listing discovery ─────────────────────────────────────────────────────

  /// Crawl the listing page and upsert every discovered subject. Returns
  /// the number of listing entries processed.
  pub async fn discover_subjects(&self) -> Result<usize> {
    info!(url = %self.sites.listing_url, "starting listing discovery");

    let session = self.launcher.launch().await?;
    let result = self.discover_with(&session).await;
    session.close().await;
    result
  }

  async fn discover_with(&self, session: &L::Session) -> Result<usize> {
    session.goto(&self.sites.listing_url).await?;
    tokio::time::sleep(self.policy.page_settle).await;

    if let Err(e) = session.run_script(REVEAL_OTHER_CONTAINER).await {
      debug!("could not reveal collapsed container: {e}");
    }

    let html = session.page_html().await?;

    let mut total = 0;
    for container in [PRIMARY_CONTAINER, OTHER_CONTAINER] {
      let found = extract::listing_subjects(&html, container);
      if found.is_empty() {
        warn!(container, "listing container missing or empty");
        continue;
      }

      let count = found.len();
      for listing in found {
        let Some(code) = extract::subject_code_from_url(&listing.href) else {
          warn!(href = %listing.href, "subject link without a code, skipped");
          continue;
        };
        let profile_url =
          extract::absolute_url(&self.sites.base_url, &listing.href)
            .unwrap_or_else(|| listing.href.clone());

        // Re-discovery refreshes listing data but keeps crawl progress.
        let subject = match
          self.store.get_subject(&code).await.map_err(Error::store)?
        {
          Some(mut existing) => {
            existing.name = listing.name;
            existing.sector = listing.sector;
            existing.profile_url = profile_url;
            existing
          }
          None => {
            Subject::discovered(code, listing.name, listing.sector, profile_url)
          }
        };
        self.store.upsert_subject(subject).await.map_err(Error::store)?;
        total += 1;
      }
      info!(container, count, "listing container processed");
    }

    info!(total, "listing discovery finished");
    Ok(total)
  }

  // ── Document passes ───────────────────────────────────────────────────────

  /// Process every known subject's profile: extract document candidates
  /// from the named sections, fetch and reconcile each.
  pub async fn process_subjects(&self) -> Result<CrawlReport> {
    self.run_pass(PassKind::FullProfile).await
  }

  /// Process only the emissions tables of every subject's profile.
  pub async fn harvest_emission_tables(&self) -> Result<CrawlReport> {
    self.run_pass(PassKind::EmissionsOnly).await
  }

  async fn run_pass(&self, pass: PassKind) -> Result<CrawlReport> {
    let subjects = self.store.list_subjects().await.map_err(Error::store)?;
    info!(subjects = subjects.len(), ?pass, "starting document pass");

    let mut report = CrawlReport::new();
    let mut session = self.launcher.launch().await?;
    let mut cursor = Cursor::new(subjects.len());

    while let Some(index) = cursor.current() {
      let subject = &subjects[index];
      info!(
        position = index + 1,
        total = subjects.len(),
        subject = %subject.code,
        "processing subject"
      );

      match self.process_one(&session, subject, pass, &mut report).await {
        Ok(()) => {
          self.mark_scanned(subject, pass).await;
          report.subject_done();
          cursor.advance();
          tokio::time::sleep(self.jittered_delay()).await;
        }
        Err(Error::SessionFatal(reason)) => {
          warn!(
            subject = %subject.code,
            "browsing session died ({reason}), restarting"
          );
          if cursor.fault_budget_exhausted(self.policy.max_session_restarts) {
            report
              .add_error(format!("{} - session restarts exhausted", subject.code));
            cursor.advance();
          }
          let dead = session;
          dead.close().await;
          tokio::time::sleep(self.policy.restart_pause).await;
          session = self.launcher.launch().await?;
        }
        Err(e) => {
          error!(subject = %subject.code, "subject failed: {e}");
          report.add_error(format!("{} - {e}", subject.code));
          cursor.advance();
        }
      }
    }

    // Session lifetime never leaks past one batch invocation.
    session.close().await;

    info!(
      processed = report.total_processed,
      new = report.new.len(),
      updated = report.updated.len(),
      errors = report.errors.len(),
      "document pass finished"
    );
    Ok(report)
  }

  async fn process_one(
    &self,
    session: &L::Session,
    subject: &Subject,
    pass: PassKind,
    report: &mut CrawlReport,
  ) -> Result<()> {
    session.goto(&subject.profile_url).await?;
    tokio::time::sleep(self.policy.page_settle).await;
    let html = session.page_html().await?;

    let candidates = match pass {
      PassKind::FullProfile => {
        extract::profile_documents(&html, &self.sites.base_url)
      }
      PassKind::EmissionsOnly => extract::emission_documents(
        &html,
        &self.sites.base_url,
        &self.sites.emission_api_fragment,
      ),
    };
    if candidates.is_empty() {
      debug!(subject = %subject.code, "no document candidates on profile");
    }

    // The same file is often linked from several sections.
    let mut seen = HashSet::new();
    for candidate in candidates {
      if !seen.insert(candidate.url.clone()) {
        continue;
      }
      self.ingest_document(session, subject, &candidate, report).await?;
    }
    Ok(())
  }

  async fn ingest_document(
    &self,
    session: &L::Session,
    subject: &Subject,
    candidate: &DocumentCandidate,
    report: &mut CrawlReport,
  ) -> Result<()> {
    let key = format!("{} - {}", subject.code, candidate.logical_name);

    let bytes = match self.channel.fetch(session, &candidate.url).await {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(url = %candidate.url, "download failed: {e}");
        self
          .store
          .record_document(NewDocumentRecord::failure(
            subject.code.as_str(),
            candidate.logical_name.as_str(),
            candidate.url.as_str(),
          ))
          .await
          .map_err(Error::store)?;
        report.add_error(key);
        return Ok(());
      }
    };

    match self
      .vault
      .reconcile(
        &self.store,
        &subject.code,
        &candidate.logical_name,
        &bytes,
        &candidate.url,
      )
      .await
    {
      Ok(outcome) => match outcome.state {
        DocumentState::New => report.add_new(key),
        DocumentState::Updated => report.add_updated(key),
        DocumentState::Unchanged => {}
        DocumentState::Error => report.add_error(key),
      },
      Err(e) => {
        error!(
          logical_name = %candidate.logical_name,
          "reconciliation failed: {e}"
        );
        report.add_error(key);
      }
    }
    Ok(())
  }

  async fn mark_scanned(&self, subject: &Subject, pass: PassKind) {
    let mut updated = subject.clone();
    if pass == PassKind::FullProfile {
      updated.processed = true;
    }
    updated.last_scanned = Some(Utc::now());

    if let Err(e) = self.store.upsert_subject(updated).await {
      error!(subject = %subject.code, "failed to persist scan timestamp: {e}");
    }
  }

  fn jittered_delay(&self) -> Duration {
    let jitter_ms = self.policy.jitter.as_millis() as u64;
    let jitter = if jitter_ms == 0 {
      0
    } else {
      rand::thread_rng().gen_range(0..jitter_ms)
    };
    self.policy.base_delay + Duration::from_millis(jitter)
  }
}

#[cfg(test)]
mod tests {
  use bursa_core::store::IngestStore as _;
  use bursa_store_sqlite::SqliteStore;

  use super::*;
  use crate::testutil::{test_crawler, ScriptedLauncher, PROFILE_HTML};

  #[test]
  fn cursor_retries_current_item_after_fault() {
    let mut cursor = Cursor::new(3);
    assert_eq!(cursor.current(), Some(0));

    assert!(!cursor.fault_budget_exhausted(3));
    assert_eq!(cursor.current(), Some(0));

    cursor.advance();
    assert_eq!(cursor.current(), Some(1));
  }

  #[test]
  fn cursor_fault_budget_resets_on_advance() {
    let mut cursor = Cursor::new(2);
    assert!(!cursor.fault_budget_exhausted(1));
    assert!(cursor.fault_budget_exhausted(1));

    cursor.advance();
    assert!(!cursor.fault_budget_exhausted(1));
  }

  #[test]
  fn cursor_finishes_past_last_item() {
    let mut cursor = Cursor::new(1);
    cursor.advance();
    assert_eq!(cursor.current(), None);
  }

  async fn seeded_store(codes: &[&str]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for code in codes {
      store
        .upsert_subject(Subject::discovered(
          *code,
          format!("Subject {code}"),
          "Banking",
          format!("https://portal.example/perfil?participante={code}"),
        ))
        .await
        .unwrap();
    }
    store
  }

  #[tokio::test]
  async fn session_crash_retries_same_subject() {
    let store = seeded_store(&["S1", "S2", "S3"]).await;
    // Second navigation (subject S2, first attempt) goes session-fatal.
    let launcher = ScriptedLauncher::new(PROFILE_HTML, b"pdf-bytes", &[1]);
    let (crawler, _dir) = test_crawler(store.clone(), launcher.clone()).await;

    let report = crawler.process_subjects().await.unwrap();

    assert_eq!(report.total_processed, 3);
    assert_eq!(report.new.len(), 3);
    assert!(report.errors.is_empty());
    // One restart: the initial session plus one replacement.
    assert_eq!(launcher.launches(), 2);

    // S2 was retried, not skipped.
    let s2_history = store.documents_for_subject("S2").await.unwrap();
    assert_eq!(s2_history.len(), 1);
    let s2 = store.get_subject("S2").await.unwrap().unwrap();
    assert!(s2.processed);
  }

  #[tokio::test]
  async fn restart_budget_exhaustion_marks_item_and_moves_on() {
    let store = seeded_store(&["S1", "S2", "S3"]).await;
    // Subject S1 crashes the session on every attempt (max_restarts = 2
    // in the test crawler → attempts 0, 1, 2 all fail).
    let launcher = ScriptedLauncher::new(PROFILE_HTML, b"pdf-bytes", &[0, 1, 2]);
    let (crawler, _dir) = test_crawler(store.clone(), launcher.clone()).await;

    let report = crawler.process_subjects().await.unwrap();

    assert_eq!(report.total_processed, 2);
    assert_eq!(report.new.len(), 2);
    assert_eq!(report.errors, ["S1 - session restarts exhausted"]);
    // Initial session plus one replacement per fault.
    assert_eq!(launcher.launches(), 4);
    assert!(store.documents_for_subject("S1").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn duplicate_links_fetch_once() {
    let store = seeded_store(&["S1"]).await;
    let launcher = ScriptedLauncher::new(PROFILE_HTML, b"pdf-bytes", &[]);
    let (crawler, _dir) = test_crawler(store.clone(), launcher.clone()).await;

    let report = crawler.process_subjects().await.unwrap();

    // PROFILE_HTML links the same document from two sections.
    assert_eq!(report.new.len(), 1);
    assert_eq!(launcher.blob_fetches(), 1);
  }

  #[tokio::test]
  async fn second_pass_reports_no_changes() {
    let store = seeded_store(&["S1"]).await;
    let launcher = ScriptedLauncher::new(PROFILE_HTML, b"pdf-bytes", &[]);
    let (crawler, _dir) = test_crawler(store.clone(), launcher.clone()).await;

    let first = crawler.process_subjects().await.unwrap();
    let second = crawler.process_subjects().await.unwrap();

    assert_eq!(first.new.len(), 1);
    assert!(second.new.is_empty());
    assert!(second.updated.is_empty());
    assert!(second.errors.is_empty());
    assert_eq!(second.total_processed, 1);
  }
}
