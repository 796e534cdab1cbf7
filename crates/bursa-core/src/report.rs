//! Batch outcome summaries handed to the API layer.

use serde::{Deserialize, Serialize};

// ─── Crawl report ────────────────────────────────────────────────────────────

/// Aggregate outcome of a document crawl pass.
///
/// Per-item entries are `"<subject code> - <logical name>"` keys; a batch
/// always completes and returns one of these, with failures represented as
/// entries in `errors` rather than a propagated fault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
  pub total_processed: u32,
  pub new:             Vec<String>,
  pub updated:         Vec<String>,
  pub errors:          Vec<String>,
}

impl CrawlReport {
  pub fn new() -> Self { Self::default() }

  pub fn add_new(&mut self, key: impl Into<String>) {
    self.new.push(key.into());
  }

  pub fn add_updated(&mut self, key: impl Into<String>) {
    self.updated.push(key.into());
  }

  pub fn add_error(&mut self, key: impl Into<String>) {
    self.errors.push(key.into());
  }

  pub fn subject_done(&mut self) { self.total_processed += 1; }
}

// ─── Ledger summary ──────────────────────────────────────────────────────────

/// Aggregate outcome of a token-ledger pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LedgerSummary {
  /// Tokens not seen before, now registered.
  pub new:     u32,
  /// Tokens already in the ledger; no download attempted.
  pub skipped: u32,
  pub errors:  u32,
}
