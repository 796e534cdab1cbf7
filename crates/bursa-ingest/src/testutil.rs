//! Shared test doubles: a scripted browsing session and a ready-made
//! crawler over temporary storage.

use std::{
  collections::HashSet,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

use bursa_store_sqlite::SqliteStore;

use crate::{
  crawler::{CrawlPolicy, Crawler, SiteConfig},
  download::DownloadChannel,
  session::{BrowserSession, SessionLauncher},
  transport::{DirectTransport, TransportConfig},
  vault::DocumentVault,
  Error, Result,
};

/// A profile page linking the same document from two sections.
pub const PROFILE_HTML: &str = r#"
  <div class="participantes-section participante">
    <a href="/docs/Annual_Report.pdf">Annual report</a>
  </div>
  <div class="participantes-section p-memorias">
    <a href="/docs/Annual_Report.pdf">Annual report again</a>
  </div>"#;

/// A ledger grid with two tokenised publications.
pub const LEDGER_HTML: &str = r#"
  <table>
    <tr id="ASPxGridPublicaciones_DXDataRow0">
      <td>1</td>
      <td><a class="linkpublicacion" href="Visor.aspx?variable1=tok-1">
        Event of 01/02/2026
      </a></td>
    </tr>
    <tr id="ASPxGridPublicaciones_DXDataRow1">
      <td>2</td>
      <td><a class="linkpublicacion" href="Visor.aspx?variable1=tok-2">
        Event of 03/02/2026
      </a></td>
    </tr>
  </table>"#;

// ─── Scripted session ────────────────────────────────────────────────────────

/// Launches [`ScriptedSession`]s that serve canned HTML and blobs, going
/// session-fatal on the navigation indices given to [`ScriptedLauncher::new`].
#[derive(Clone)]
pub struct ScriptedLauncher {
  html:         String,
  blob:         Vec<u8>,
  fatal_navs:   Arc<HashSet<usize>>,
  nav_counter:  Arc<AtomicUsize>,
  blob_counter: Arc<AtomicUsize>,
  launches:     Arc<AtomicUsize>,
}

impl ScriptedLauncher {
  pub fn new(html: &str, blob: &[u8], fatal_navs: &[usize]) -> Self {
    Self {
      html:         html.to_owned(),
      blob:         blob.to_vec(),
      fatal_navs:   Arc::new(fatal_navs.iter().copied().collect()),
      nav_counter:  Arc::new(AtomicUsize::new(0)),
      blob_counter: Arc::new(AtomicUsize::new(0)),
      launches:     Arc::new(AtomicUsize::new(0)),
    }
  }

  /// How many sessions have been created so far.
  pub fn launches(&self) -> usize {
    self.launches.load(Ordering::SeqCst)
  }

  /// How many in-session blob fetches have been served.
  pub fn blob_fetches(&self) -> usize {
    self.blob_counter.load(Ordering::SeqCst)
  }
}

impl SessionLauncher for ScriptedLauncher {
  type Session = ScriptedSession;

  async fn launch(&self) -> Result<ScriptedSession> {
    self.launches.fetch_add(1, Ordering::SeqCst);
    Ok(ScriptedSession {
      html:         self.html.clone(),
      blob:         self.blob.clone(),
      fatal_navs:   self.fatal_navs.clone(),
      nav_counter:  self.nav_counter.clone(),
      blob_counter: self.blob_counter.clone(),
    })
  }
}

pub struct ScriptedSession {
  html:         String,
  blob:         Vec<u8>,
  fatal_navs:   Arc<HashSet<usize>>,
  nav_counter:  Arc<AtomicUsize>,
  blob_counter: Arc<AtomicUsize>,
}

impl BrowserSession for ScriptedSession {
  async fn goto(&self, _url: &str) -> Result<()> {
    let nav = self.nav_counter.fetch_add(1, Ordering::SeqCst);
    if self.fatal_navs.contains(&nav) {
      return Err(Error::SessionFatal("scripted crash".into()));
    }
    Ok(())
  }

  async fn page_html(&self) -> Result<String> {
    Ok(self.html.clone())
  }

  async fn run_script(&self, _js: &str) -> Result<()> {
    Ok(())
  }

  async fn fetch_blob(&self, _url: &str) -> Option<Vec<u8>> {
    self.blob_counter.fetch_add(1, Ordering::SeqCst);
    Some(self.blob.clone())
  }

  async fn cookie_header(&self) -> Result<String> {
    Ok("session=scripted".into())
  }

  async fn close(self) {}
}

// ─── Crawler assembly ────────────────────────────────────────────────────────

/// A crawler over temporary storage with zero delays and a restart budget
/// of two per item.
pub async fn test_crawler(
  store: SqliteStore,
  launcher: ScriptedLauncher,
) -> (Crawler<SqliteStore, ScriptedLauncher>, tempfile::TempDir) {
  let dir = tempfile::tempdir().unwrap();
  let vault = DocumentVault::open(
    dir.path().join("staging"),
    dir.path().join("downloads"),
  )
  .await
  .unwrap();

  let transport = DirectTransport::new(&TransportConfig {
    user_agent:           "bursa-tests".into(),
    connect_timeout:      Duration::from_secs(5),
    accept_invalid_certs: false,
    pin_legacy_tls:       false,
  })
  .unwrap();

  let sites = SiteConfig {
    base_url:              "https://portal.example".into(),
    listing_url:           "https://portal.example/participants/".into(),
    emission_api_fragment: "api/cargaArchivos/descargarprospecto".into(),
    ledger_list_url:       "https://ledger.example/List.aspx".into(),
    ledger_base_url:       "https://ledger.example/".into(),
    ledger_dir:            "ledger".into(),
    ledger_prefix:         "REG".into(),
  };

  let policy = CrawlPolicy {
    page_settle:          Duration::ZERO,
    base_delay:           Duration::ZERO,
    jitter:               Duration::ZERO,
    restart_pause:        Duration::ZERO,
    max_session_restarts: 2,
  };

  let crawler = Crawler::new(
    store,
    vault,
    DownloadChannel::new(transport),
    launcher,
    sites,
    policy,
  );
  (crawler, dir)
}
