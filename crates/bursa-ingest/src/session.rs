//! The browsing-session seam.
//!
//! [`BrowserSession`] is the explicit session handle passed to every
//! operation that needs the live browsing context. It is owned by the
//! crawler and never retained by called components beyond the call, which
//! is what lets the crawler discard and recreate a session mid-batch.
//!
//! [`ChromiumSession`] is the production implementation over a headless
//! Chromium instance driven through the DevTools protocol.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::{
  browser::{Browser, BrowserConfig},
  cdp::js_protocol::runtime::EvaluateParams,
  Page,
};
use futures::StreamExt as _;
use tokio::{task::JoinHandle, time::timeout};
use tracing::{debug, warn};

use crate::{Error, IngestConfig, Result};

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A live, already-authenticated browsing context.
///
/// Navigation-level failures and timeouts are session-fatal; the in-page
/// blob fetch fails silently so the caller can fall back to the direct
/// transport.
pub trait BrowserSession: Send + Sync {
  /// Navigate the session to `url` and wait for the load to finish.
  async fn goto(&self, url: &str) -> Result<()>;

  /// Serialise the current DOM.
  async fn page_html(&self) -> Result<String>;

  /// Run a fire-and-forget script in the page (e.g. forcing a collapsed
  /// container visible). Callers treat failures as non-fatal.
  async fn run_script(&self, js: &str) -> Result<()>;

  /// Strategy A: fetch `url` from inside the page, inheriting cookies, TLS
  /// state, and client-side redirects. Returns `None` on ANY failure
  /// (script timeout, non-ok response, serialisation) — never errors.
  async fn fetch_blob(&self, url: &str) -> Option<Vec<u8>>;

  /// All cookies currently held by the session, serialised into a single
  /// `name=value; …` request-header value.
  async fn cookie_header(&self) -> Result<String>;

  /// Best-effort teardown; errors are ignored.
  async fn close(self);
}

/// Creates fresh browsing sessions. The crawler holds one of these so it
/// can recreate a session after a session-fatal fault without losing its
/// position in the batch.
pub trait SessionLauncher: Send + Sync {
  type Session: BrowserSession;

  async fn launch(&self) -> Result<Self::Session>;
}

// ─── Chromium implementation ─────────────────────────────────────────────────

/// Launches headless Chromium sessions configured for the source portals.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
  user_agent:        String,
  page_load_timeout: Duration,
  script_timeout:    Duration,
}

impl ChromiumLauncher {
  pub fn from_config(config: &IngestConfig) -> Self {
    Self {
      user_agent:        config.user_agent.clone(),
      page_load_timeout: config.page_load_timeout(),
      script_timeout:    config.script_timeout(),
    }
  }
}

impl SessionLauncher for ChromiumLauncher {
  type Session = ChromiumSession;

  async fn launch(&self) -> Result<ChromiumSession> {
    let browser_config = BrowserConfig::builder()
      .no_sandbox()
      .window_size(1920, 1080)
      .args(vec![
        "--disable-gpu".to_owned(),
        "--disable-dev-shm-usage".to_owned(),
        "--ignore-certificate-errors".to_owned(),
        format!("--user-agent={}", self.user_agent),
      ])
      .build()
      .map_err(Error::Setup)?;

    let (browser, mut handler) = Browser::launch(browser_config)
      .await
      .map_err(|e| Error::Setup(format!("failed to launch browser: {e}")))?;

    // Drain DevTools protocol events until the browser goes away.
    let handler_task = tokio::spawn(async move {
      while handler.next().await.is_some() {}
    });

    let page = browser
      .new_page("about:blank")
      .await
      .map_err(|e| Error::Setup(format!("failed to open page: {e}")))?;

    debug!("browsing session launched");
    Ok(ChromiumSession {
      browser,
      page,
      handler_task,
      page_load_timeout: self.page_load_timeout,
      script_timeout: self.script_timeout,
    })
  }
}

/// One headless Chromium instance with a single active page.
pub struct ChromiumSession {
  browser:           Browser,
  page:              Page,
  handler_task:      JoinHandle<()>,
  page_load_timeout: Duration,
  script_timeout:    Duration,
}

impl ChromiumSession {
  async fn evaluate_value<T>(&self, expression: String) -> Result<T>
  where
    T: serde::de::DeserializeOwned,
  {
    let params = EvaluateParams::builder()
      .expression(expression)
      .await_promise(true)
      .return_by_value(true)
      .build()
      .map_err(Error::SessionFatal)?;

    let outcome = timeout(self.script_timeout, self.page.evaluate(params))
      .await
      .map_err(|_| Error::SessionFatal("script evaluation timed out".into()))?
      .map_err(|e| Error::SessionFatal(e.to_string()))?;

    outcome
      .into_value()
      .map_err(|e| Error::SessionFatal(e.to_string()))
  }
}

impl BrowserSession for ChromiumSession {
  async fn goto(&self, url: &str) -> Result<()> {
    let navigation = async {
      self.page.goto(url).await?;
      self.page.wait_for_navigation().await?;
      Ok::<_, chromiumoxide::error::CdpError>(())
    };

    timeout(self.page_load_timeout, navigation)
      .await
      .map_err(|_| {
        Error::SessionFatal(format!("navigation to {url} timed out"))
      })?
      .map_err(|e| Error::SessionFatal(e.to_string()))?;
    Ok(())
  }

  async fn page_html(&self) -> Result<String> {
    self
      .page
      .content()
      .await
      .map_err(|e| Error::SessionFatal(e.to_string()))
  }

  async fn run_script(&self, js: &str) -> Result<()> {
    self.evaluate_value::<serde_json::Value>(js.to_owned()).await?;
    Ok(())
  }

  async fn fetch_blob(&self, url: &str) -> Option<Vec<u8>> {
    // Fetch in-page, read the body as a blob, hand it back as a base64
    // data URL. Any failure resolves to null rather than throwing.
    let url_literal = serde_json::to_string(url).ok()?;
    let script = format!(
      r#"(async () => {{
        try {{
          const resp = await fetch({url_literal});
          if (!resp.ok) return null;
          const blob = await resp.blob();
          return await new Promise((resolve) => {{
            const reader = new FileReader();
            reader.onloadend = () =>
              resolve(typeof reader.result === 'string' ? reader.result : null);
            reader.onerror = () => resolve(null);
            reader.readAsDataURL(blob);
          }});
        }} catch (e) {{
          return null;
        }}
      }})()"#
    );

    let data_url: Option<String> =
      self.evaluate_value(script).await.ok().flatten();
    let data_url = data_url?;

    // data:<mime>;base64,<payload>
    let (_, payload) = data_url.split_once(',')?;
    BASE64.decode(payload).ok()
  }

  async fn cookie_header(&self) -> Result<String> {
    let cookies = self
      .page
      .get_cookies()
      .await
      .map_err(|e| Error::SessionFatal(e.to_string()))?;

    Ok(
      cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; "),
    )
  }

  async fn close(mut self) {
    if let Err(e) = self.browser.close().await {
      warn!("browser close failed: {e}");
    }
    if let Err(e) = self.browser.wait().await {
      warn!("browser wait failed: {e}");
    }
    self.handler_task.abort();
  }
}
