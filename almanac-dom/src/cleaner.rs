//! Per-page orchestration of the normalization passes.
//!
//! All passes edit the same tree in place, in a fixed order:
//! unwanted elements, content filters, engine comments, links, empty
//! blocks, infobox extraction and almanac synthesis, and finally removal of
//! the raw infobox from the article.
use kuchikikiki::NodeRef;
use log::{debug, error, info};

use crate::{
  almanac::{AlmanacShape, AlmanacSynthesizer},
  dom,
  error::CleanError,
  infobox::{self, InfoboxData},
  links::LinkRewriter,
  sidebar::render_sidebar,
  types::{CleanedContent, ContentType},
};

/// Selectors for site chrome, ads and edit clutter.
pub const DEFAULT_UNWANTED_SELECTORS: [&str; 14] = [
  ".fandom-community-header",
  ".global-navigation",
  ".page-header",
  ".rail-module",
  ".wikia-ad",
  ".ad-slot",
  ".mw-editsection",
  ".comments",
  ".article-comments",
  ".stub",
  ".ambox",
  ".mbox",
  ".pi-title-image",
  ".navbox-div .navbar ul",
];

/// Selectors of raw infobox parts removed from the article once extracted.
pub const DEFAULT_SIDEBAR_SELECTORS: [&str; 3] =
  [".pi-item", ".pi-panel", ".portable-infobox"];

/// Selectors of the article root inside a full wiki page.
pub const DEFAULT_CONTENT_SELECTORS: [&str; 2] =
  ["#mw-content-text", ".mw-parser-output"];

/// Sections dropped from every page, matched against heading text.
pub const REMOVED_SECTIONS: [&str; 2] = ["衍生内容", "图库"];

/// Headings of reference sections whose navigation bars are dropped.
const SEE_ALSO_SECTIONS: [&str; 3] = ["参见", "另见", "参考"];

/// Markers of the diagnostic comments MediaWiki appends to rendered pages.
const ENGINE_COMMENT_MARKERS: [&str; 4] = [
  "NewPP limit report",
  "Transclusion expansion time report",
  "Saved in parser cache",
  "Cached time",
];

/// Settings of the [`Cleaner`].
#[derive(Debug, Clone)]
pub struct CleanOptions {
  pub unwanted_selectors: Vec<String>,
  pub sidebar_selectors:  Vec<String>,
  pub content_selectors:  Vec<String>,
  pub links:              LinkRewriter,
}

impl Default for CleanOptions {
  fn default() -> Self {
    Self {
      unwanted_selectors: to_strings(&DEFAULT_UNWANTED_SELECTORS),
      sidebar_selectors:  to_strings(&DEFAULT_SIDEBAR_SELECTORS),
      content_selectors:  to_strings(&DEFAULT_CONTENT_SELECTORS),
      links:              LinkRewriter::default(),
    }
  }
}

fn to_strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| (*s).to_string()).collect()
}

/// What cleaning one page produced, besides the edited tree.
#[derive(Debug, Clone)]
pub struct CleanReport {
  pub infobox:         Option<InfoboxData>,
  pub almanac:         AlmanacShape,
  pub sidebar_html:    String,
  pub links_rewritten: usize,
}

/// Normalizes wiki article trees.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
  options: CleanOptions,
}

impl Cleaner {
  #[must_use]
  pub const fn new(options: CleanOptions) -> Self {
    Self { options }
  }

  #[must_use]
  pub const fn options(&self) -> &CleanOptions {
    &self.options
  }

  /// First element of `document` matching the content selectors.
  #[must_use]
  pub fn find_content_root(&self, document: &NodeRef) -> Option<NodeRef> {
    self
      .options
      .content_selectors
      .iter()
      .find_map(|selector| dom::select_first(document, selector))
  }

  /// Clean a full wiki page given as HTML.
  ///
  /// # Errors
  ///
  /// Returns an error if the page is empty or has no content root.
  pub fn clean_html(
    &self,
    html: &str,
    content_type: ContentType,
  ) -> Result<CleanedContent, CleanError> {
    if html.trim().is_empty() {
      return Err(CleanError::EmptyDocument);
    }

    let document = dom::parse_document(html);
    let root = self.find_content_root(&document).ok_or_else(|| {
      CleanError::MissingContentRoot(self.options.content_selectors.join(", "))
    })?;
    self.clean_content(&root, content_type)
  }

  /// Clean an article root and return the article and sidebar markup.
  ///
  /// # Errors
  ///
  /// Returns an error if the root is empty or a pass aborted.
  pub fn clean_content(
    &self,
    root: &NodeRef,
    content_type: ContentType,
  ) -> Result<CleanedContent, CleanError> {
    let report = self.clean_document(root, content_type)?;
    Ok(CleanedContent {
      main_html:    dom::serialize(root),
      sidebar_html: report.sidebar_html,
    })
  }

  /// Run every pass over `root` in place.
  ///
  /// A panic inside a pass is caught and reported as
  /// [`CleanError::Aborted`]. This needs an unwinding build, which is why the
  /// workspace release profile keeps the default `panic = "unwind"`.
  ///
  /// # Errors
  ///
  /// Returns an error if the root is empty or a pass aborted.
  pub fn clean_document(
    &self,
    root: &NodeRef,
    content_type: ContentType,
  ) -> Result<CleanReport, CleanError> {
    if root.as_element().is_none() && root.as_document().is_none() {
      return Err(CleanError::EmptyDocument);
    }
    if root.first_child().is_none() {
      return Err(CleanError::EmptyDocument);
    }

    // A malformed tree must only fail this page.
    contain_panic(|| self.run_passes(root, content_type))
  }

  fn run_passes(&self, root: &NodeRef, content_type: ContentType) -> CleanReport {
    for selector in &self.options.unwanted_selectors {
      dom::detach_all(dom::select_all(root, selector));
    }

    apply_content_filters(root);
    remove_engine_comments(root);
    let links_rewritten = self.options.links.rewrite(root);
    remove_empty_blocks(root);

    let infobox_node = infobox::find_infobox(root);
    let infobox = infobox_node.as_ref().map(infobox::extract);
    if infobox.is_none() {
      debug!("No infobox found");
    }

    let data = infobox.clone().unwrap_or_default();
    let almanac =
      AlmanacSynthesizer::new(root, &data, infobox_node.as_ref()).run();

    let sidebar_html = infobox
      .as_ref()
      .map(|data| render_sidebar(data, content_type))
      .unwrap_or_default();

    for selector in &self.options.sidebar_selectors {
      dom::detach_all(dom::select_all(root, selector));
    }
    if let Some(node) = infobox_node {
      node.detach();
    }

    info!(
      "Cleaned page '{}': almanac {almanac:?}, {links_rewritten} links",
      data.title
    );

    CleanReport {
      infobox,
      almanac,
      sidebar_html,
      links_rewritten,
    }
  }
}

/// Content filters of the article body: notes, unwanted sections,
/// reference navigation bars, caption icons and the table of contents.
fn apply_content_filters(root: &NodeRef) {
  dom::detach_all(dom::select_all(root, ".hatnote"));

  for title in REMOVED_SECTIONS {
    remove_section(root, title);
  }

  clean_see_also(root);
  remove_caption_icons(root);
  clean_toc(root);
}

/// Remove the first section whose heading mentions `title`, heading
/// included.
fn remove_section(root: &NodeRef, title: &str) {
  let Some(heading) = dom::find_heading(root, &[title], None) else {
    return;
  };
  debug!("Removing section '{title}'");
  dom::detach_all(dom::section_body(&heading));
  heading.detach();
}

fn clean_see_also(root: &NodeRef) {
  for heading in dom::headings(root) {
    let text = dom::stripped_text(&heading);
    if !SEE_ALSO_SECTIONS.iter().any(|title| text.contains(title)) {
      continue;
    }
    for node in dom::section_body(&heading) {
      dom::detach_all(dom::select_all(&node, ".navbar"));
    }
  }
}

fn remove_caption_icons(root: &NodeRef) {
  dom::detach_all(dom::select_all(root, "figure.thumb svg"));
  dom::detach_all(dom::select_all(root, "figure.thumb .info-icon"));
  dom::detach_all(
    dom::select_all(root, "figure.thumb figcaption a")
      .into_iter()
      .filter(dom::is_blank),
  );
}

/// Drop TOC entries of removed sections and renumber the rest.
fn clean_toc(root: &NodeRef) {
  let Some(toc) = dom::select_first(root, "div#toc") else {
    return;
  };

  for text in dom::select_all(&toc, "a span.toctext") {
    let label = dom::stripped_text(&text);
    if REMOVED_SECTIONS.iter().any(|title| label.contains(title))
      && let Some(item) = text.ancestors().find(|node| dom::is_tag(node, "li"))
    {
      item.detach();
    }
  }

  renumber_toc(&toc);
}

fn renumber_toc(toc: &NodeRef) {
  for (i, top) in dom::select_all(toc, "li.toclevel-1").iter().enumerate() {
    let number = i + 1;
    set_toc_number(top, &number.to_string());

    for (j, sub) in dom::select_all(top, "li.toclevel-2").iter().enumerate() {
      set_toc_number(sub, &format!("{number}.{}", j + 1));
    }
  }
}

fn set_toc_number(item: &NodeRef, number: &str) {
  if let Some(span) = dom::select_first(item, "span.tocnumber") {
    for child in span.children().collect::<Vec<_>>() {
      child.detach();
    }
    span.append(NodeRef::new_text(number));
  }
}

fn remove_engine_comments(root: &NodeRef) {
  let comments: Vec<NodeRef> = root
    .inclusive_descendants()
    .filter(|node| {
      node.as_comment().is_some_and(|comment| {
        let text = comment.borrow();
        ENGINE_COMMENT_MARKERS.iter().any(|marker| text.contains(marker))
      })
    })
    .collect();

  if !comments.is_empty() {
    debug!("Removing {} engine comments", comments.len());
  }
  dom::detach_all(comments);
}

/// Drop paragraphs and divs without text. Divs holding an image stay.
fn remove_empty_blocks(root: &NodeRef) {
  for node in dom::select_all(root, "p, div") {
    if *root == node || !dom::is_blank(&node) {
      continue;
    }
    if dom::is_tag(&node, "div") && dom::select_first(&node, "img").is_some() {
      continue;
    }
    node.detach();
  }
}

/// Run `f`, turning a panic into [`CleanError::Aborted`].
fn contain_panic<T>(f: impl FnOnce() -> T) -> Result<T, CleanError> {
  std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|e| {
    let message = e
      .downcast_ref::<String>()
      .cloned()
      .or_else(|| e.downcast_ref::<&str>().map(|s| (*s).to_string()))
      .unwrap_or_else(|| "unknown error".to_string());
    error!("Error cleaning document: {message}");
    CleanError::Aborted(message)
  })
}
