//! Token-ledger ingestion — the simpler reconciliation mode.
//!
//! Used for the source that issues a stable opaque token per publication
//! and never changes the content behind a token. A token already in the
//! ledger short-circuits the row entirely: no download is attempted and no
//! new record is written. Fresh tokens are fetched through the dual-channel
//! download (the file stream sits behind the portal's server session, so the
//! direct fallback carries the harvested cookies) and registered
//! unconditionally, with the success flag reflecting the fetch outcome.

use tracing::{debug, error, info, warn};

use bursa_core::{
  ledger::NewTokenRecord, report::LedgerSummary, store::IngestStore,
};

use crate::{
  crawler::Crawler,
  extract::{self, LedgerRow},
  session::{BrowserSession, SessionLauncher},
  Error, Result,
};

enum RowOutcome {
  New,
  Skipped,
  Failed,
}

impl<S, L> Crawler<S, L>
where
  S: IngestStore,
  L: SessionLauncher,
{
  /// Ingest the ledger's publications list for one year.
  pub async fn ingest_ledger(&self, year: i32) -> Result<LedgerSummary> {
    let url = format!("{}?Gestion={year}", self.sites.ledger_list_url);
    info!(url, "starting ledger pass");

    let session = self.launcher.launch().await?;
    let result = self.ledger_pass(&session, &url).await;
    session.close().await;

    if let Ok(summary) = &result {
      info!(
        new = summary.new,
        skipped = summary.skipped,
        errors = summary.errors,
        "ledger pass finished"
      );
    }
    result
  }

  async fn ledger_pass(
    &self,
    session: &L::Session,
    url: &str,
  ) -> Result<LedgerSummary> {
    session.goto(url).await?;
    tokio::time::sleep(self.policy.page_settle).await;
    let html = session.page_html().await?;

    let rows = extract::ledger_rows(&html);
    if rows.is_empty() {
      warn!("ledger grid missing or empty");
    } else {
      info!(rows = rows.len(), "ledger rows found");
    }

    let mut summary = LedgerSummary::default();
    for row in rows {
      match self.ingest_ledger_row(session, &row).await {
        Ok(RowOutcome::New) => summary.new += 1,
        Ok(RowOutcome::Skipped) => summary.skipped += 1,
        Ok(RowOutcome::Failed) => summary.errors += 1,
        Err(e) => {
          error!(token = %row.token, "ledger row failed: {e}");
          summary.errors += 1;
        }
      }
    }
    Ok(summary)
  }

  async fn ingest_ledger_row(
    &self,
    session: &L::Session,
    row: &LedgerRow,
  ) -> Result<RowOutcome> {
    if self.store.token_exists(&row.token).await.map_err(Error::store)? {
      debug!(token = %row.token, "token already ingested");
      return Ok(RowOutcome::Skipped);
    }

    let url = extract::absolute_url(&self.sites.ledger_base_url, &row.href)
      .unwrap_or_else(|| {
        format!("{}{}", self.sites.ledger_base_url, row.href)
      });
    let file_name = self.ledger_file_name(&row.source_date, &row.token);

    let downloaded = match self.channel.fetch(session, &url).await {
      Ok(bytes) => {
        match self
          .vault
          .store_fixed(&self.sites.ledger_dir, &file_name, &bytes)
          .await
        {
          Ok(()) => {
            info!(token = %row.token, file_name, "ledger document stored");
            true
          }
          Err(e) => {
            warn!(token = %row.token, "ledger write failed: {e}");
            false
          }
        }
      }
      Err(e) => {
        warn!(url, "ledger download failed: {e}");
        false
      }
    };

    self
      .store
      .record_token(NewTokenRecord {
        entity:      self.sites.ledger_prefix.clone(),
        source_date: row.source_date.clone(),
        reference:   row.reference.clone(),
        token:       row.token.clone(),
        file_name,
        downloaded,
      })
      .await
      .map_err(Error::store)?;

    tokio::time::sleep(self.policy.base_delay).await;
    Ok(if downloaded { RowOutcome::New } else { RowOutcome::Failed })
  }

  fn ledger_file_name(&self, source_date: &str, token: &str) -> String {
    let date = source_date.replace('/', "-");
    let token8: String = token.chars().take(8).collect();
    format!("{}_{date}_{token8}.pdf", self.sites.ledger_prefix)
  }
}
