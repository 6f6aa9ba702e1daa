//! Rewriting of internal wiki links to local page files.
//!
//! A scraped page for `https://pvz.fandom.com/zh/wiki/豌豆射手` is written as
//! `豌豆射手.html`, so every link to that article inside another page must
//! point at `./豌豆射手.html`. Both sides use [`page_filename_stem`].
use indexmap::IndexMap;
use kuchikikiki::NodeRef;
use log::debug;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::dom;

/// Class added to every rewritten link.
pub const LOCAL_LINK_CLASS: &str = "local-link";

/// Link target used for the wiki's home page.
pub const HOME_PAGE_TARGET: &str = "./index.html";

/// Characters kept in page filenames besides alphanumerics.
const FILENAME_EXTRA_CHARS: [char; 5] = [' ', '-', '_', '「', '」'];

/// Sanitize a decoded page name into a filename stem.
///
/// Keeps alphanumerics (any script), space, hyphen, underscore and the
/// corner brackets used in some article titles, then trims surrounding
/// whitespace.
#[must_use]
pub fn page_filename_stem(page_name: &str) -> String {
  page_name
    .chars()
    .filter(|c| c.is_alphanumeric() || FILENAME_EXTRA_CHARS.contains(c))
    .collect::<String>()
    .trim()
    .to_string()
}

/// Filename (`<stem>.html`) for a decoded page name.
#[must_use]
pub fn page_filename(page_name: &str) -> String {
  format!("{}.html", page_filename_stem(page_name))
}

/// Filename for a page URL: the last path segment, percent-decoded and
/// sanitized.
#[must_use]
pub fn page_filename_from_url(page_url: &str) -> String {
  let path = Url::parse(page_url).map_or_else(
    |_| strip_query(page_url).to_string(),
    |url| url.path().to_string(),
  );
  let segment = path.rsplit('/').next().unwrap_or_default();
  page_filename(&decode(segment))
}

fn strip_query(href: &str) -> &str {
  href.split(['?', '#']).next().unwrap_or_default()
}

fn decode(segment: &str) -> String {
  percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Rewrites internal article links to `./<page>.html`.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
  wiki_host:  String,
  home_pages: Vec<String>,
  redirects:  IndexMap<String, String>,
}

impl Default for LinkRewriter {
  fn default() -> Self {
    Self::new("pvz.fandom.com")
      .with_home_page("植物大战僵尸中文维基")
      .with_home_page("Plants_vs._Zombies_Wiki")
      .with_redirect("植物大战僵尸Online", "植物大战僵尸")
  }
}

impl LinkRewriter {
  /// Create a rewriter for links on `wiki_host`, without special cases.
  #[must_use]
  pub fn new(wiki_host: impl Into<String>) -> Self {
    Self {
      wiki_host:  wiki_host.into(),
      home_pages: Vec::new(),
      redirects:  IndexMap::new(),
    }
  }

  /// Treat links to `page_name` as links to the site index.
  #[must_use]
  pub fn with_home_page(mut self, page_name: impl Into<String>) -> Self {
    self.home_pages.push(page_name.into());
    self
  }

  /// Send links to `from` to the page file of `to`.
  #[must_use]
  pub fn with_redirect(
    mut self,
    from: impl Into<String>,
    to: impl Into<String>,
  ) -> Self {
    self.redirects.insert(from.into(), to.into());
    self
  }

  #[must_use]
  pub fn wiki_host(&self) -> &str {
    &self.wiki_host
  }

  /// Decoded article name an `href` points at, if it is an internal article
  /// link. Namespaced pages (`File:`, `Category:` ...) are not articles.
  #[must_use]
  pub fn page_name(&self, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
      return None;
    }

    let absolute = href
      .strip_prefix("//")
      .map_or_else(|| href.to_string(), |rest| format!("https://{rest}"));

    let path = match Url::parse(&absolute) {
      Ok(url) => {
        if !url.host_str().is_some_and(|host| self.is_wiki_host(host)) {
          return None;
        }
        url.path().to_string()
      },
      Err(_) if href.starts_with('/') => strip_query(href).to_string(),
      Err(_) => return None,
    };

    let (_, article) = path.split_once("/wiki/")?;
    let segment = article.rsplit('/').next().unwrap_or_default();
    let name = decode(segment);

    if name.trim().is_empty() || name.contains(':') {
      return None;
    }
    Some(name)
  }

  fn is_wiki_host(&self, host: &str) -> bool {
    host == self.wiki_host
      || host
        .strip_suffix(self.wiki_host.as_str())
        .is_some_and(|prefix| prefix.ends_with('.'))
  }

  /// Local target for a decoded article name.
  #[must_use]
  pub fn target_for(&self, page_name: &str) -> Option<String> {
    let normalized = page_name.replace(' ', "_");
    if self
      .home_pages
      .iter()
      .any(|home| home.replace(' ', "_") == normalized)
    {
      return Some(HOME_PAGE_TARGET.to_string());
    }

    let canonical = self
      .redirects
      .get(page_name)
      .map_or(page_name, String::as_str);
    let stem = page_filename_stem(canonical);
    if stem.is_empty() {
      return None;
    }
    Some(format!("./{stem}.html"))
  }

  /// Rewrite every internal article link below `root`.
  ///
  /// Returns the number of links rewritten. External links are untouched.
  pub fn rewrite(&self, root: &NodeRef) -> usize {
    let mut rewritten = 0;

    for link in dom::select_all(root, "a[href]") {
      let Some(href) = dom::attr(&link, "href") else {
        continue;
      };
      let Some(target) = self
        .page_name(&href)
        .and_then(|name| self.target_for(&name))
      else {
        continue;
      };

      dom::set_attr(&link, "href", &target);
      dom::add_class(&link, LOCAL_LINK_CLASS);
      rewritten += 1;
    }

    debug!("Rewrote {rewritten} internal links");
    rewritten
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_page_filename_stem_filters_characters() {
    assert_eq!(page_filename_stem("豌豆射手"), "豌豆射手");
    assert_eq!(page_filename_stem(" 「樱桃」炸弹 (PvZ2)? "), "「樱桃」炸弹 PvZ2");
    assert_eq!(page_filename_stem("Wall-nut_2"), "Wall-nut_2");
  }

  #[test]
  fn test_filename_from_url_matches_link_target() {
    let url = "https://pvz.fandom.com/zh/wiki/%E8%B1%8C%E8%B1%86%E5%B0%84%E6%89%8B";
    assert_eq!(page_filename_from_url(url), "豌豆射手.html");

    let rewriter = LinkRewriter::default();
    let name = rewriter.page_name(url).unwrap();
    assert_eq!(rewriter.target_for(&name).unwrap(), "./豌豆射手.html");
  }

  #[test]
  fn test_page_name_recognizes_internal_links() {
    let rewriter = LinkRewriter::default();
    assert_eq!(rewriter.page_name("/zh/wiki/向日葵").as_deref(), Some("向日葵"));
    assert_eq!(
      rewriter.page_name("/wiki/Sunflower?action=edit#Top").as_deref(),
      Some("Sunflower")
    );
    assert_eq!(
      rewriter.page_name("//pvz.fandom.com/zh/wiki/坚果墙").as_deref(),
      Some("坚果墙")
    );
    assert_eq!(rewriter.page_name("https://example.com/wiki/Foo"), None);
    assert_eq!(rewriter.page_name("/zh/wiki/File:Peashooter.png"), None);
    assert_eq!(rewriter.page_name("#cite_note-1"), None);
    assert_eq!(rewriter.page_name("./images/a.png"), None);
  }

  #[test]
  fn test_special_cases() {
    let rewriter = LinkRewriter::default();
    assert_eq!(
      rewriter.target_for("植物大战僵尸中文维基").as_deref(),
      Some(HOME_PAGE_TARGET)
    );
    assert_eq!(
      rewriter.target_for("植物大战僵尸Online").as_deref(),
      Some("./植物大战僵尸.html")
    );
  }

  #[test]
  fn test_rewrite_tags_links() {
    let body = dom::parse_fragment(
      r#"<p><a href="/zh/wiki/%E5%90%91%E6%97%A5%E8%91%B5" class="x">向日葵</a>
      <a href="https://www.example.org/">ext</a></p>"#,
    );
    let count = LinkRewriter::default().rewrite(&body);
    assert_eq!(count, 1);

    let links = dom::select_all(&body, "a");
    assert_eq!(dom::attr(&links[0], "href").as_deref(), Some("./向日葵.html"));
    assert!(dom::has_class(&links[0], LOCAL_LINK_CLASS));
    assert!(dom::has_class(&links[0], "x"));
    assert_eq!(
      dom::attr(&links[1], "href").as_deref(),
      Some("https://www.example.org/")
    );
  }
}
