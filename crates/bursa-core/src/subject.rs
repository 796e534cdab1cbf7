//! Subject — the entity whose published documents are being tracked.
//!
//! A subject is identified by an opaque code assigned by the source portal
//! (taken from its profile URL). Subjects are upserted during listing
//! discovery and never deleted; a crawl pass flips `processed` and stamps
//! `last_scanned`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issuer or market participant discovered on the listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  /// Opaque code assigned by the portal, stable across crawls.
  pub code:         String,
  pub name:         String,
  /// Sector classification taken from the listing section header.
  pub sector:       String,
  pub profile_url:  String,
  /// Whether a document pass has completed for this subject at least once.
  pub processed:    bool,
  pub last_scanned: Option<DateTime<Utc>>,
}

impl Subject {
  /// A freshly discovered, not-yet-processed subject.
  pub fn discovered(
    code: impl Into<String>,
    name: impl Into<String>,
    sector: impl Into<String>,
    profile_url: impl Into<String>,
  ) -> Self {
    Self {
      code:         code.into(),
      name:         name.into(),
      sector:       sector.into(),
      profile_url:  profile_url.into(),
      processed:    false,
      last_scanned: None,
    }
  }
}
