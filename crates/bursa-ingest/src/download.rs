//! The dual-channel download strategy.
//!
//! Strategy A fetches from inside the live browsing context (inherits
//! cookies, TLS state, and anti-bot checks transparently). On any failure it
//! passes control silently to Strategy B: a direct HTTP request carrying the
//! session's harvested cookies. Only when both are exhausted does a fetch
//! surface a transport error — which callers capture per item, never
//! letting it abort a batch.

use tracing::debug;

use crate::{session::BrowserSession, transport::DirectTransport, Result};

/// Two-strategy document fetcher.
#[derive(Clone)]
pub struct DownloadChannel {
  transport: DirectTransport,
}

impl DownloadChannel {
  pub fn new(transport: DirectTransport) -> Self {
    Self { transport }
  }

  /// Fetch `url`, trying the in-session channel first.
  pub async fn fetch<B: BrowserSession>(
    &self,
    session: &B,
    url: &str,
  ) -> Result<Vec<u8>> {
    if let Some(bytes) = session.fetch_blob(url).await {
      if !bytes.is_empty() {
        debug!(url, size = bytes.len(), "in-session fetch succeeded");
        return Ok(bytes);
      }
    }

    debug!(url, "in-session fetch yielded nothing, falling back to direct transport");

    // Cookie harvesting can itself die with the session; fall back to a
    // cookie-less request rather than giving up on the item.
    let cookies = session.cookie_header().await.ok();
    self.transport.fetch(url, cookies.as_deref()).await
  }
}
