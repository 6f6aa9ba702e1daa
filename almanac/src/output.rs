//! Page titles, output filenames and rendering through the embedded
//! templates.
use std::{
  fs,
  path::{Path, PathBuf},
};

use almanac_dom::{ContentType, dom, page_filename_from_url};
use almanac_templates::{
  INDEX_TEMPLATE,
  PAGE_TEMPLATE,
  STYLE_CSS,
  STYLESHEET_PATH,
};
use kuchikikiki::NodeRef;
use log::debug;
use tera::Tera;

use crate::error::ScrapeError;

/// Title used when no title selector matches.
pub const FALLBACK_TITLE: &str = "PvZ Wiki Page";

/// Format of every timestamp written to pages and metadata.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Current time in UTC, formatted with [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn now_utc() -> String {
  jiff::Timestamp::now().strftime(TIMESTAMP_FORMAT).to_string()
}

/// Text of the first title selector that matches with non-empty text.
#[must_use]
pub fn extract_title(document: &NodeRef, selectors: &[String]) -> String {
  selectors
    .iter()
    .filter_map(|selector| dom::select_first(document, selector))
    .map(|node| node.text_contents().trim().to_string())
    .find(|title| !title.is_empty())
    .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Filename for a page named by its title: alphanumerics, space, hyphen
/// and underscore are kept, spaces become underscores, and the stem is cut
/// to `max_length` characters.
#[must_use]
pub fn title_filename(title: &str, max_length: usize) -> String {
  let stem: String = title
    .chars()
    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
    .collect::<String>()
    .trim()
    .replace(' ', "_")
    .chars()
    .take(max_length)
    .collect();

  if stem.is_empty() {
    "page.html".to_string()
  } else {
    format!("{stem}.html")
  }
}

/// Output filename of a page.
///
/// An explicit name wins. Pages scraped for a content type are named after
/// their URL, the same name links from other pages point at. Anything else
/// is named after its title.
#[must_use]
pub fn output_filename(
  url: &str,
  title: &str,
  explicit: Option<&str>,
  content_type: Option<ContentType>,
  max_length: usize,
) -> String {
  match (explicit, content_type) {
    (Some(name), _) => name.to_string(),
    (None, Some(_)) => page_filename_from_url(url),
    (None, None) => title_filename(title, max_length),
  }
}

/// Renders pages and the index with the embedded templates.
#[derive(Debug)]
pub struct Renderer {
  tera: Tera,
}

impl Renderer {
  /// # Errors
  ///
  /// Returns an error if an embedded template does not parse.
  pub fn new() -> Result<Self, ScrapeError> {
    let mut tera = Tera::default();
    tera.add_raw_template("page.html", PAGE_TEMPLATE)?;
    tera.add_raw_template("index.html", INDEX_TEMPLATE)?;
    Ok(Self { tera })
  }

  /// Render one article page.
  ///
  /// # Errors
  ///
  /// Returns an error if rendering fails.
  pub fn render_page(
    &self,
    title: &str,
    main_content: &str,
    sidebar_content: &str,
  ) -> Result<String, ScrapeError> {
    let mut tera_context = tera::Context::new();
    tera_context.insert("title", title);
    tera_context.insert("main_content", main_content);
    tera_context.insert("sidebar_content", sidebar_content);
    tera_context.insert("stylesheet", STYLESHEET_PATH);
    Ok(self.tera.render("page.html", &tera_context)?)
  }

  /// Render the index listing `pages` (file stems).
  ///
  /// # Errors
  ///
  /// Returns an error if rendering fails.
  pub fn render_index(
    &self,
    pages: &[String],
    last_updated: &str,
  ) -> Result<String, ScrapeError> {
    let mut tera_context = tera::Context::new();
    tera_context.insert("pages", pages);
    tera_context.insert("page_count", &pages.len());
    tera_context.insert("page_list_json", &serde_json::to_string(pages)?);
    tera_context.insert("last_updated", last_updated);
    tera_context.insert("stylesheet", STYLESHEET_PATH);
    Ok(self.tera.render("index.html", &tera_context)?)
  }
}

/// Write the stylesheet under `output_dir` unless it is already there.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_stylesheet(output_dir: &Path) -> Result<PathBuf, ScrapeError> {
  let path = output_dir.join(STYLESHEET_PATH);
  if path.exists() {
    return Ok(path);
  }

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&path, STYLE_CSS)?;
  debug!("Wrote stylesheet {}", path.display());
  Ok(path)
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_extract_title_order_and_fallback() {
    let document = dom::parse_document(
      r#"<h1 id="firstHeading"> 豌豆射手 </h1><h1 class="page-header__title">x</h1>"#,
    );
    let selectors = vec![
      ".mw-page-title-main".to_string(),
      "#firstHeading".to_string(),
      "h1".to_string(),
    ];
    assert_eq!(extract_title(&document, &selectors), "豌豆射手");

    let empty = dom::parse_document("<p>no title</p>");
    assert_eq!(extract_title(&empty, &selectors), FALLBACK_TITLE);
  }

  #[test]
  fn test_title_filename() {
    assert_eq!(title_filename("Snow Pea (PvZ)", 100), "Snow_Pea_PvZ.html");
    assert_eq!(title_filename("寒冰射手", 100), "寒冰射手.html");
    assert_eq!(title_filename("abcdef", 3), "abc.html");
    assert_eq!(title_filename("???", 100), "page.html");
  }

  #[test]
  fn test_output_filename_rules() {
    let url = "https://pvz.fandom.com/zh/wiki/%E5%AF%92%E5%86%B0%E5%B0%84%E6%89%8B";
    assert_eq!(
      output_filename(url, "Snow Pea", Some("custom.html"), None, 100),
      "custom.html"
    );
    assert_eq!(
      output_filename(url, "Snow Pea", None, Some(ContentType::Plants), 100),
      "寒冰射手.html"
    );
    assert_eq!(
      output_filename(url, "Snow Pea", None, None, 100),
      "Snow_Pea.html"
    );
  }

  #[test]
  fn test_render_page_escapes_title_only() {
    let renderer = Renderer::new().unwrap();
    let html = renderer
      .render_page("A <b>", "<p>body</p>", "")
      .unwrap();
    assert!(html.contains("<title>A &lt;b&gt;</title>"));
    assert!(html.contains("<p>body</p>"));
    assert!(!html.contains("<aside"));
    assert!(html.contains("./styles/style.css"));
  }

  #[test]
  fn test_render_index() {
    let renderer = Renderer::new().unwrap();
    let pages = vec!["向日葵".to_string(), "豌豆射手".to_string()];
    let html = renderer.render_index(&pages, "2026-01-01 00:00:00 UTC").unwrap();
    assert!(html.contains("共 2 个页面"));
    assert!(html.contains(r#"href="./向日葵.html""#));
    assert!(html.contains(r#"const PAGES = ["向日葵","豌豆射手"];"#));
    assert!(html.contains("2026-01-01 00:00:00 UTC"));
  }
}
