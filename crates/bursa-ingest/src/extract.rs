//! Site-specific structure discovery.
//!
//! Pure functions from an HTML snapshot to candidate lists; no I/O. A page
//! that lacks the expected structure yields an empty vector — callers log
//! and carry on, structural misses are never fatal.

use scraper::{ElementRef, Html, Selector};
use url::Url;

// ─── Candidates ──────────────────────────────────────────────────────────────

/// One subject link found on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSubject {
  pub sector: String,
  pub name:   String,
  pub href:   String,
}

/// One downloadable document discovered on a profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCandidate {
  pub logical_name: String,
  pub url:          String,
}

/// One row of the token-ledger publications grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
  pub source_date: String,
  pub reference:   String,
  pub token:       String,
  pub href:        String,
}

fn sel(selector: &str) -> Option<Selector> {
  Selector::parse(selector).ok()
}

// ─── Listing page ────────────────────────────────────────────────────────────

/// Extract subject links from one listing container (`primary` and `other`
/// participants live in separate containers).
pub fn listing_subjects(html: &str, container_id: &str) -> Vec<ListingSubject> {
  let document = Html::parse_document(html);

  let Some(container_sel) = sel(&format!("#{container_id}")) else {
    return Vec::new();
  };
  let (Some(block_sel), Some(title_sel), Some(link_sel)) = (
    sel(".emisores"),
    sel(".emisores__title"),
    sel("ul.emisores__list li a.emisores__link"),
  ) else {
    return Vec::new();
  };

  let Some(container) = document.select(&container_sel).next() else {
    return Vec::new();
  };

  let mut out = Vec::new();
  for block in container.select(&block_sel) {
    let sector = block
      .select(&title_sel)
      .next()
      .map(|t| text_of(&t))
      .unwrap_or_default();

    for link in block.select(&link_sel) {
      let Some(href) = link.value().attr("href") else { continue };
      out.push(ListingSubject {
        sector: sector.clone(),
        name:   text_of(&link),
        href:   href.to_owned(),
      });
    }
  }
  out
}

/// Pull the opaque subject code out of a profile URL's query string.
pub fn subject_code_from_url(url: &str) -> Option<String> {
  let tail = url.split("participante=").nth(1)?;
  let code = tail.split('&').next().unwrap_or(tail);
  (!code.is_empty()).then(|| code.to_owned())
}

// ─── Profile pages ───────────────────────────────────────────────────────────

/// The named profile sections that carry direct PDF links.
const PROFILE_SECTIONS: [&str; 4] = [
  ".participantes-section.participante",
  ".participantes-section.p-memorias",
  ".participantes-section.p-estados-mensuales",
  ".participantes-section.p-emisiones",
];

/// Extract every direct PDF link from the known profile sections.
///
/// Logical names are the escaped final path segment of the URL, with
/// `%20` collapsed to `_`.
pub fn profile_documents(html: &str, base_url: &str) -> Vec<DocumentCandidate> {
  let document = Html::parse_document(html);
  let Some(link_sel) = sel("a[href]") else { return Vec::new() };

  let mut out = Vec::new();
  for section in PROFILE_SECTIONS {
    let Some(section_sel) = sel(section) else { continue };
    for section_el in document.select(&section_sel) {
      for link in section_el.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        if !href.to_lowercase().ends_with(".pdf") {
          continue;
        }
        let Some(url) = absolute_url(base_url, href) else { continue };
        let url = url.replace(' ', "%20");
        let Some(logical_name) = file_name_of(&url) else { continue };
        out.push(DocumentCandidate { logical_name, url });
      }
    }
  }
  out
}

// ─── Emission tables ─────────────────────────────────────────────────────────

/// Extract download-API links from the emissions section's prospectus and
/// ratings tables, assigning sanitised logical names built from the row
/// labels.
pub fn emission_documents(
  html: &str,
  base_url: &str,
  api_fragment: &str,
) -> Vec<DocumentCandidate> {
  let document = Html::parse_document(html);

  let (Some(section_sel), Some(row_sel), Some(cell_sel), Some(link_sel)) = (
    sel(".participantes-section.p-emisiones"),
    sel("table tbody tr"),
    sel("td"),
    sel("a[href]"),
  ) else {
    return Vec::new();
  };
  let (Some(prospect_sel), Some(rating_sel)) = (
    sel(".p-column-table.l-prospecto"),
    sel(".p-column-table.l-calif"),
  ) else {
    return Vec::new();
  };

  let Some(section) = document.select(&section_sel).next() else {
    return Vec::new();
  };

  let mut out = Vec::new();

  // Prospectus table: one emission per row, links suffixed by kind.
  for table in section.select(&prospect_sel) {
    for row in table.select(&row_sel) {
      let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
      let Some(first) = cells.first() else { continue };
      let emission = sanitize_name(&text_of(first), false);
      if emission.is_empty() {
        continue;
      }

      for link in row.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        if !href.contains(api_fragment) {
          continue;
        }
        let kind = if href.ends_with("/CARAC") {
          "Caracteristicas"
        } else if href.ends_with("/P") {
          "Prospecto"
        } else {
          "Documento"
        };
        let Some(url) = absolute_url(base_url, href) else { continue };
        out.push(DocumentCandidate {
          logical_name: format!("{emission}_{kind}.pdf"),
          url,
        });
      }
    }
  }

  // Ratings table: entity + grade per row.
  for table in section.select(&rating_sel) {
    for row in table.select(&row_sel) {
      let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
      if cells.len() < 2 {
        continue;
      }
      let entity = text_of(&cells[0]);
      let grade = text_of(&cells[1]);
      let base = sanitize_name(&format!("Calificacion_{entity}_{grade}"), true);

      for link in row.select(&link_sel) {
        let Some(href) = link.value().attr("href") else { continue };
        if !href.contains(api_fragment) && !href.to_lowercase().ends_with(".pdf")
        {
          continue;
        }
        let Some(url) = absolute_url(base_url, href) else { continue };
        out.push(DocumentCandidate {
          logical_name: format!("{base}.pdf"),
          url,
        });
      }
    }
  }

  out
}

// ─── Ledger grid ─────────────────────────────────────────────────────────────

/// Extract publication rows from the ledger's data grid.
pub fn ledger_rows(html: &str) -> Vec<LedgerRow> {
  let document = Html::parse_document(html);

  let (Some(row_sel), Some(cell_sel), Some(link_sel)) = (
    sel(r#"tr[id^="ASPxGridPublicaciones_DXDataRow"]"#),
    sel("td"),
    sel("a.linkpublicacion"),
  ) else {
    return Vec::new();
  };

  let mut out = Vec::new();
  for row in document.select(&row_sel) {
    let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
    if cells.len() < 2 {
      continue;
    }
    let Some(link) = cells[1].select(&link_sel).next() else { continue };
    let Some(href) = link.value().attr("href") else { continue };

    let Some(token) = token_from_href(href) else { continue };
    let reference = text_of(&link);
    let source_date =
      date_in(&reference).unwrap_or_else(|| "undated".to_owned());

    out.push(LedgerRow {
      source_date,
      reference,
      token,
      href: href.to_owned(),
    });
  }
  out
}

/// The opaque download token is the tail of the viewer link's query.
pub fn token_from_href(href: &str) -> Option<String> {
  let tail = href.split("variable1=").nth(1)?;
  (!tail.is_empty()).then(|| tail.to_owned())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn text_of(el: &ElementRef) -> String {
  el.text().collect::<String>().trim().to_owned()
}

/// Resolve `href` against `base_url` unless it is already absolute.
pub fn absolute_url(base_url: &str, href: &str) -> Option<String> {
  if href.starts_with("http") {
    return Some(href.to_owned());
  }
  let base = Url::parse(base_url).ok()?;
  base.join(href).ok().map(String::from)
}

/// Final path segment of a URL, with `%20` collapsed to `_`.
fn file_name_of(url: &str) -> Option<String> {
  let parsed = Url::parse(url).ok()?;
  let name = parsed.path().rsplit('/').next()?.replace("%20", "_");
  (!name.is_empty()).then_some(name)
}

/// Keep only filename-safe characters, mapping spaces to underscores.
pub fn sanitize_name(raw: &str, keep_dash: bool) -> String {
  raw
    .trim()
    .replace(' ', "_")
    .chars()
    .filter(|c| {
      c.is_ascii_alphanumeric() || *c == '_' || (keep_dash && *c == '-')
    })
    .collect()
}

/// First `dd/mm/yyyy` date embedded in `text`, if any.
fn date_in(text: &str) -> Option<String> {
  let b = text.as_bytes();
  for start in 0..b.len().saturating_sub(9) {
    let w = &b[start..start + 10];
    let digits_at = |idx: &[usize]| idx.iter().all(|&i| w[i].is_ascii_digit());
    if w[2] == b'/'
      && w[5] == b'/'
      && digits_at(&[0, 1, 3, 4, 6, 7, 8, 9])
    {
      return Some(String::from_utf8_lossy(w).into_owned());
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  const LISTING: &str = r#"
    <div id="emisores-content">
      <div class="emisores">
        <h3 class="emisores__title">Banking</h3>
        <ul class="emisores__list">
          <li><a class="emisores__link" href="/perfil?participante=BIA">Bank A</a></li>
          <li><a class="emisores__link" href="/perfil?participante=BIB&x=1">Bank B</a></li>
        </ul>
      </div>
    </div>
    <div id="otros-content">
      <div class="emisores">
        <h3 class="emisores__title">Insurance</h3>
        <ul class="emisores__list">
          <li><a class="emisores__link" href="https://portal.example/perfil?participante=SEG">Insurer</a></li>
        </ul>
      </div>
    </div>"#;

  #[test]
  fn listing_subjects_per_container() {
    let primary = listing_subjects(LISTING, "emisores-content");
    assert_eq!(primary.len(), 2);
    assert_eq!(primary[0].sector, "Banking");
    assert_eq!(primary[0].name, "Bank A");
    assert_eq!(primary[0].href, "/perfil?participante=BIA");

    let other = listing_subjects(LISTING, "otros-content");
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].sector, "Insurance");
  }

  #[test]
  fn missing_container_yields_nothing() {
    assert!(listing_subjects(LISTING, "no-such-container").is_empty());
  }

  #[test]
  fn subject_code_parsing() {
    assert_eq!(
      subject_code_from_url("/perfil?participante=BIA").as_deref(),
      Some("BIA")
    );
    assert_eq!(
      subject_code_from_url("/perfil?participante=BIB&x=1").as_deref(),
      Some("BIB")
    );
    assert!(subject_code_from_url("/perfil?otro=1").is_none());
  }

  #[test]
  fn profile_documents_resolves_and_names() {
    let html = r#"
      <div class="participantes-section p-memorias">
        <a href="/docs/Balance 2024.pdf">Balance</a>
        <a href="https://portal.example/docs/Memoria.PDF">Memoria</a>
        <a href="/docs/notas.txt">ignored</a>
      </div>"#;

    let docs = profile_documents(html, "https://portal.example");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].logical_name, "Balance_2024.pdf");
    assert_eq!(docs[0].url, "https://portal.example/docs/Balance%202024.pdf");
    assert_eq!(docs[1].logical_name, "Memoria.PDF");
  }

  #[test]
  fn emission_documents_builds_logical_names() {
    let html = r#"
      <div class="participantes-section p-emisiones">
        <div class="p-column-table l-prospecto">
          <table><tbody>
            <tr>
              <td>Bonos Serie A</td>
              <td>
                <a href="/api/cargaArchivos/descargarprospecto/77/P">p</a>
                <a href="/api/cargaArchivos/descargarprospecto/77/CARAC">c</a>
              </td>
            </tr>
          </tbody></table>
        </div>
        <div class="p-column-table l-calif">
          <table><tbody>
            <tr>
              <td>Rating Co.</td>
              <td>AA-</td>
              <td><a href="/api/cargaArchivos/descargarprospecto/78/R">r</a></td>
            </tr>
          </tbody></table>
        </div>
      </div>"#;

    let docs = emission_documents(
      html,
      "https://portal.example",
      "api/cargaArchivos/descargarprospecto",
    );
    let names: Vec<&str> =
      docs.iter().map(|d| d.logical_name.as_str()).collect();
    assert_eq!(
      names,
      [
        "Bonos_Serie_A_Prospecto.pdf",
        "Bonos_Serie_A_Caracteristicas.pdf",
        "Calificacion_Rating_Co_AA-.pdf",
      ]
    );
    assert!(docs[0].url.starts_with("https://portal.example/api/"));
  }

  #[test]
  fn ledger_rows_extract_token_and_date() {
    let html = r#"
      <table>
        <tr id="ASPxGridPublicaciones_DXDataRow0">
          <td>1</td>
          <td><a class="linkpublicacion" href="VisorDocumentos.aspx?variable1=tok-abc-123">
            Relevant event of 05/03/2026 published
          </a></td>
        </tr>
        <tr id="ASPxGridPublicaciones_DXDataRow1">
          <td>2</td>
          <td><a class="linkpublicacion" href="VisorDocumentos.aspx?nada=1">no token</a></td>
        </tr>
      </table>"#;

    let rows = ledger_rows(html);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].token, "tok-abc-123");
    assert_eq!(rows[0].source_date, "05/03/2026");
    assert!(rows[0].reference.contains("Relevant event"));
  }

  #[test]
  fn date_scan_handles_absence() {
    assert_eq!(date_in("no date here"), None);
    assert_eq!(date_in("due 31/12/2025, see note"), Some("31/12/2025".into()));
  }

  #[test]
  fn sanitize_strips_unsafe_characters() {
    assert_eq!(sanitize_name("Bonos Serie A (2024)", false), "Bonos_Serie_A_2024");
    assert_eq!(sanitize_name("AA- / stable", true), "AA-__stable");
  }
}
