//! Pointing image references of a page at the cache.
use std::sync::LazyLock;

use almanac_dom::dom;
use indexmap::IndexMap;
use kuchikikiki::NodeRef;
use log::{debug, error, info};
use regex::Regex;
use url::Url;

use crate::{cache::ImageCache, source::ImageSource, utils::never_matching_regex};

static SCALE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"/scale-to-width-down/\d+").unwrap_or_else(|e| {
    error!("Failed to compile SCALE_SEGMENT regex in rewrite.rs: {e}");
    never_matching_regex()
  })
});

static REVISION_TAIL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"/revision/latest.*").unwrap_or_else(|e| {
    error!("Failed to compile REVISION_TAIL regex in rewrite.rs: {e}");
    never_matching_regex()
  })
});

/// Attributes that would make a browser ignore the rewritten `src`.
const STALE_SOURCE_ATTRS: [&str; 3] = ["data-src", "srcset", "data-srcset"];

/// Remote URL -> local reference substitutions made on one page.
pub type Substitutions = IndexMap<String, String>;

/// Image URL without query string and thumbnail scaling, used to match
/// links to the same image at another size.
#[must_use]
pub fn image_base_url(url: &str) -> String {
  let base = url.split('?').next().unwrap_or_default();
  let base = SCALE_SEGMENT.replace_all(base, "");
  REVISION_TAIL
    .replace(&base, "/revision/latest")
    .into_owned()
}

/// Turn a protocol-relative or root-relative `src` into an absolute URL.
///
/// Root-relative sources are resolved against the origin of `page_url`,
/// or `base_url` when there is no usable page URL.
#[must_use]
pub fn absolutize(src: &str, page_url: &str, base_url: &str) -> String {
  if let Some(rest) = src.strip_prefix("//") {
    return format!("https://{rest}");
  }
  if !src.starts_with('/') {
    return src.to_string();
  }

  let origin = Url::parse(page_url)
    .ok()
    .filter(|url| url.has_host())
    .or_else(|| Url::parse(base_url).ok());
  origin
    .and_then(|origin| origin.join(src).ok())
    .map_or_else(|| src.to_string(), String::from)
}

impl<S: ImageSource> ImageCache<S> {
  /// Whether `src` is left alone: inline data, vector art or an image that
  /// already points into the cache.
  fn is_skipped(&self, src: &str) -> bool {
    let local = format!(
      "{}/",
      self.options().reference_prefix.trim_end_matches('/')
    );
    src.starts_with("data:") || src.starts_with(&local) || src.ends_with(".svg")
  }

  /// Download every image below `root` and point it at its local copy.
  ///
  /// Links to a downloaded image, at any thumbnail size, are rewritten to
  /// the same local copy. Images that fail to download keep their remote
  /// source. Returns the substitutions made.
  pub fn localize_document(
    &mut self,
    root: &NodeRef,
    page_url: &str,
  ) -> Substitutions {
    let images = dom::select_all(root, "img");
    let mut substitutions = Substitutions::new();
    if images.is_empty() {
      return substitutions;
    }
    debug!("Found {} images to process", images.len());

    for img in images {
      let Some(src) = dom::image_source(&img) else {
        continue;
      };
      if self.is_skipped(&src) {
        continue;
      }

      let url = absolutize(&src, page_url, &self.options().base_url);
      let Some(path) = self.resolve(&url) else {
        continue;
      };

      let reference = self.local_reference(&path);
      dom::set_attr(&img, "src", &reference);
      for name in STALE_SOURCE_ATTRS {
        dom::remove_attr(&img, name);
      }
      substitutions.insert(url, reference);
    }

    let links = update_image_links(root, &substitutions);
    info!(
      "Localized {} images and {links} image links",
      substitutions.len()
    );
    substitutions
  }

  /// Localize the images of an HTML fragment.
  ///
  /// Always returns markup; when nothing could be downloaded the input
  /// comes back re-serialized but otherwise unchanged.
  pub fn process_images_in_html(&mut self, html: &str, page_url: &str) -> String {
    if html.trim().is_empty() {
      return html.to_string();
    }

    let body = dom::parse_fragment(html);
    self.localize_document(&body, page_url);
    dom::serialize(&body)
  }
}

/// Point every `<a href>` that targets a substituted image, directly or by
/// base form, at the local copy. Returns the number of links changed.
pub fn update_image_links(root: &NodeRef, substitutions: &Substitutions) -> usize {
  if substitutions.is_empty() {
    return 0;
  }

  let bases: Vec<(String, &str)> = substitutions
    .iter()
    .map(|(url, local)| (image_base_url(url), local.as_str()))
    .collect();

  let mut changed = 0;
  for link in dom::select_all(root, "a[href]") {
    let Some(href) = dom::attr(&link, "href") else {
      continue;
    };

    let target = substitutions.get(&href).map(String::as_str).or_else(|| {
      let href_base = image_base_url(&href);
      bases
        .iter()
        .find(|(base, _)| *base == href_base)
        .map(|(_, local)| *local)
    });

    if let Some(local) = target {
      dom::set_attr(&link, "href", local);
      changed += 1;
    }
  }
  changed
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_image_base_url() {
    assert_eq!(
      image_base_url(
        "https://static.example.net/pvz/images/a/ab/Peashooter.png/revision/latest/scale-to-width-down/268?cb=2020"
      ),
      "https://static.example.net/pvz/images/a/ab/Peashooter.png/revision/latest"
    );
    assert_eq!(
      image_base_url("https://static.example.net/x.png?cb=1"),
      "https://static.example.net/x.png"
    );
  }

  #[test]
  fn test_absolutize() {
    let page = "https://pvz.fandom.com/zh/wiki/%E8%B1%8C";
    assert_eq!(
      absolutize("//static.example.net/a.png", page, ""),
      "https://static.example.net/a.png"
    );
    assert_eq!(
      absolutize("/images/a.png", page, "https://other.example"),
      "https://pvz.fandom.com/images/a.png"
    );
    assert_eq!(
      absolutize("/images/a.png", "", "https://other.example"),
      "https://other.example/images/a.png"
    );
    assert_eq!(
      absolutize("https://x.example/a.png", page, ""),
      "https://x.example/a.png"
    );
  }

  #[test]
  fn test_update_links_by_base_form() {
    let body = dom::parse_fragment(
      r#"<a id="full" href="https://s.example/a.png/revision/latest?cb=1">full</a>
<a id="other" href="https://s.example/b.png">other</a>"#,
    );
    let mut substitutions = Substitutions::new();
    substitutions.insert(
      "https://s.example/a.png/revision/latest/scale-to-width-down/100"
        .to_string(),
      "./images/a.png".to_string(),
    );

    assert_eq!(update_image_links(&body, &substitutions), 1);
    let full = dom::select_first(&body, "#full").unwrap();
    assert_eq!(dom::attr(&full, "href").unwrap(), "./images/a.png");
    let other = dom::select_first(&body, "#other").unwrap();
    assert_eq!(dom::attr(&other, "href").unwrap(), "https://s.example/b.png");
  }
}
