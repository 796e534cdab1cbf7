//! Direct HTTP transport — Strategy B of the download channel.
//!
//! An independent network request carrying a realistic client identity and,
//! when available, the cookies harvested from the browsing session. Required
//! because some targets gate document retrieval behind the browsing session
//! but do not expose those documents to in-page script execution.

use std::time::Duration;

use reqwest::{header, Client};
use tracing::{debug, warn};

use crate::{Error, IngestConfig, Result};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Immutable transport settings, constructed once and handed to
/// [`DirectTransport::new`]. Trust-all and protocol pinning are named,
/// auditable flags here — not silent client defaults.
#[derive(Debug, Clone)]
pub struct TransportConfig {
  pub user_agent:           String,
  pub connect_timeout:      Duration,
  /// Accept self-signed/legacy certificates served by the production
  /// portals.
  pub accept_invalid_certs: bool,
  /// Pin negotiation to TLS 1.2; the ledger source fails the handshake
  /// under modern defaults.
  pub pin_legacy_tls:       bool,
}

impl TransportConfig {
  pub fn from_config(config: &IngestConfig) -> Self {
    Self {
      user_agent:           config.user_agent.clone(),
      connect_timeout:      config.connect_timeout(),
      accept_invalid_certs: config.accept_invalid_certs,
      pin_legacy_tls:       config.pin_legacy_tls,
    }
  }
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Stateless-per-call HTTP transport.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DirectTransport {
  client: Client,
}

impl DirectTransport {
  pub fn new(config: &TransportConfig) -> Result<Self> {
    let mut builder = Client::builder()
      .user_agent(config.user_agent.as_str())
      .connect_timeout(config.connect_timeout);

    if config.accept_invalid_certs {
      builder = builder.danger_accept_invalid_certs(true);
    }
    if config.pin_legacy_tls {
      builder = builder
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .max_tls_version(reqwest::tls::Version::TLS_1_2);
    }

    let client = builder
      .build()
      .map_err(|e| Error::Setup(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client })
  }

  /// Fetch `url`, optionally carrying a harvested session cookie header.
  ///
  /// Succeeds only on a 2xx status with a non-empty body. Content-type
  /// sniffing is advisory: an HTML body where a binary was expected is
  /// logged, not failed.
  pub async fn fetch(
    &self,
    url: &str,
    cookie_header: Option<&str>,
  ) -> Result<Vec<u8>> {
    let mut request = self.client.get(url);
    if let Some(cookies) = cookie_header.filter(|c| !c.is_empty()) {
      request = request.header(header::COOKIE, cookies);
    }

    let response = request.send().await.map_err(|e| Error::Transport {
      url:    url.to_owned(),
      reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Transport {
        url:    url.to_owned(),
        reason: format!("status {status}"),
      });
    }

    let content_type = response
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("")
      .to_owned();
    if content_type.contains("text/html") {
      warn!(url, content_type, "binary download answered with an HTML body");
    }

    let bytes = response.bytes().await.map_err(|e| Error::Transport {
      url:    url.to_owned(),
      reason: e.to_string(),
    })?;

    if bytes.is_empty() {
      return Err(Error::Transport {
        url:    url.to_owned(),
        reason: "empty body".into(),
      });
    }

    debug!(url, size = bytes.len(), "direct transport fetch succeeded");
    Ok(bytes.to_vec())
  }
}
