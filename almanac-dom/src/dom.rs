//! Thin helpers over the kuchikikiki tree.
//!
//! Every cleaning and synthesis step works on one owned, mutable tree per
//! page. These helpers keep the selector plumbing, attribute access and
//! element construction in one place so the passes read as a list of edits.
use kuchikikiki::{Attribute, ExpandedName, NodeRef, iter::NodeIterator};
use log::warn;
use markup5ever::{LocalName, QualName, ns};
use tendril::TendrilSink;

/// Parse a full HTML document.
#[must_use]
pub fn parse_document(html: &str) -> NodeRef {
  kuchikikiki::parse_html().one(html)
}

/// Parse an HTML snippet and return its `<body>` element.
///
/// The parser always synthesizes `html`, `head` and `body`, so the body is
/// the natural container for a fragment. Falls back to the document node if
/// no body could be found.
#[must_use]
pub fn parse_fragment(html: &str) -> NodeRef {
  let document = parse_document(html);
  select_first(&document, "body").unwrap_or(document)
}

/// Serialize a node including itself. Document and `<body>` nodes serialize
/// only their children.
#[must_use]
pub fn serialize(node: &NodeRef) -> String {
  if node.as_document().is_some() || is_tag(node, "body") {
    return serialize_children(node);
  }

  let mut out = Vec::new();
  if let Err(e) = node.serialize(&mut out) {
    warn!("Failed to serialize node: {e}");
  }
  String::from_utf8(out).unwrap_or_default()
}

/// Serialize the children of a node, without the node itself.
#[must_use]
pub fn serialize_children(node: &NodeRef) -> String {
  let mut out = Vec::new();
  for child in node.children() {
    if let Err(e) = child.serialize(&mut out) {
      warn!("Failed to serialize node: {e}");
    }
  }
  String::from_utf8(out).unwrap_or_default()
}

/// Collect every element matching `selector` below `root`.
///
/// Matches are collected up front so callers may detach nodes while walking
/// the result. An invalid selector yields no matches.
#[must_use]
pub fn select_all(root: &NodeRef, selector: &str) -> Vec<NodeRef> {
  root.select(selector).map_or_else(
    |()| {
      warn!("Ignoring invalid selector: {selector}");
      Vec::new()
    },
    |matches| matches.map(|m| m.as_node().clone()).collect(),
  )
}

/// First element matching `selector` below `root`.
#[must_use]
pub fn select_first(root: &NodeRef, selector: &str) -> Option<NodeRef> {
  root.select_first(selector).ok().map(|m| m.as_node().clone())
}

/// Build an HTML element with the given attributes.
#[must_use]
pub fn element(tag: &str, attrs: &[(&str, &str)]) -> NodeRef {
  NodeRef::new_element(
    QualName::new(None, ns!(html), LocalName::from(tag)),
    attrs.iter().map(|(name, value)| {
      (ExpandedName::new(ns!(), LocalName::from(*name)), Attribute {
        prefix: None,
        value:  (*value).to_string(),
      })
    }),
  )
}

/// Build an element holding a single text node.
#[must_use]
pub fn element_with_text(
  tag: &str,
  attrs: &[(&str, &str)],
  text: &str,
) -> NodeRef {
  let node = element(tag, attrs);
  node.append(NodeRef::new_text(text));
  node
}

/// Whether `node` is an element with the given local name.
#[must_use]
pub fn is_tag(node: &NodeRef, tag: &str) -> bool {
  node
    .as_element()
    .is_some_and(|e| e.name.local.as_ref() == tag)
}

/// Local name of an element node.
#[must_use]
pub fn tag_name(node: &NodeRef) -> Option<String> {
  node.as_element().map(|e| e.name.local.to_string())
}

/// Read an attribute value.
#[must_use]
pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
  node
    .as_element()
    .and_then(|e| e.attributes.borrow().get(name).map(str::to_string))
}

/// Set (or replace) an attribute value. No-op for non-element nodes.
pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
  if let Some(element) = node.as_element() {
    element
      .attributes
      .borrow_mut()
      .insert(LocalName::from(name), value.to_string());
  }
}

/// Remove an attribute. No-op for non-element nodes.
pub fn remove_attr(node: &NodeRef, name: &str) {
  if let Some(element) = node.as_element() {
    element.attributes.borrow_mut().remove(LocalName::from(name));
  }
}

/// Whether the element's `class` attribute contains `class` as a token.
#[must_use]
pub fn has_class(node: &NodeRef, class: &str) -> bool {
  attr(node, "class")
    .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
}

/// Append a token to the element's `class` attribute.
pub fn add_class(node: &NodeRef, class: &str) {
  if has_class(node, class) {
    return;
  }
  let value = match attr(node, "class") {
    Some(existing) if !existing.trim().is_empty() => {
      format!("{} {class}", existing.trim())
    },
    _ => class.to_string(),
  };
  set_attr(node, "class", &value);
}

/// Heading level for `h1`..`h6`.
#[must_use]
pub fn heading_level(node: &NodeRef) -> Option<u8> {
  let name = tag_name(node)?;
  let digit = name.strip_prefix('h')?;
  match digit.parse::<u8>() {
    Ok(level @ 1..=6) if digit.len() == 1 => Some(level),
    _ => None,
  }
}

/// Text of a node with every text piece trimmed and concatenated.
///
/// This mirrors how wiki labels are read: `<h3> 阳光花费 </h3>` and
/// `<b>阳光</b> <i>花费</i>` both read as `阳光花费`.
#[must_use]
pub fn stripped_text(node: &NodeRef) -> String {
  node
    .inclusive_descendants()
    .text_nodes()
    .map(|text| text.borrow().trim().to_string())
    .collect::<String>()
}

/// Whether a node carries no visible text.
#[must_use]
pub fn is_blank(node: &NodeRef) -> bool {
  node
    .inclusive_descendants()
    .text_nodes()
    .all(|text| text.borrow().trim().is_empty())
}

/// Whether `node` lies inside `container` (or is the container itself).
#[must_use]
pub fn is_within(node: &NodeRef, container: &NodeRef) -> bool {
  node.inclusive_ancestors().any(|ancestor| ancestor == *container)
}

/// The document node that owns `node`.
#[must_use]
pub fn document_of(node: &NodeRef) -> NodeRef {
  node.inclusive_ancestors().last().unwrap_or_else(|| node.clone())
}

/// Every heading below `root` in document order.
#[must_use]
pub fn headings(root: &NodeRef) -> Vec<NodeRef> {
  select_all(root, "h1, h2, h3, h4, h5, h6")
}

/// First heading below `root` whose text contains any of `needles`,
/// optionally restricted to one level.
#[must_use]
pub fn find_heading(
  root: &NodeRef,
  needles: &[&str],
  level: Option<u8>,
) -> Option<NodeRef> {
  headings(root).into_iter().find(|heading| {
    if level.is_some_and(|l| heading_level(heading) != Some(l)) {
      return false;
    }
    let text = stripped_text(heading);
    needles.iter().any(|needle| text.contains(needle))
  })
}

/// Siblings following a heading up to (excluding) the next heading of the
/// same or a higher level.
#[must_use]
pub fn section_body(heading: &NodeRef) -> Vec<NodeRef> {
  let Some(level) = heading_level(heading) else {
    return Vec::new();
  };

  heading
    .following_siblings()
    .take_while(|sibling| heading_level(sibling).is_none_or(|l| l > level))
    .collect()
}

/// Detach every node in `nodes`.
pub fn detach_all<I>(nodes: I)
where
  I: IntoIterator<Item = NodeRef>,
{
  for node in nodes {
    node.detach();
  }
}

/// Source of an `<img>`, preferring the lazy-load attribute.
#[must_use]
pub fn image_source(img: &NodeRef) -> Option<String> {
  ["data-src", "src"]
    .iter()
    .filter_map(|name| attr(img, name))
    .map(|value| value.trim().to_string())
    .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_fragment_roundtrip_keeps_markup() {
    let body = parse_fragment("<p class=\"a\">Hi <b>there</b></p>");
    assert_eq!(serialize(&body), "<p class=\"a\">Hi <b>there</b></p>");
  }

  #[test]
  fn test_heading_level() {
    let body = parse_fragment("<h3>x</h3><hr><p>y</p>");
    let nodes: Vec<_> = body.children().collect();
    assert_eq!(heading_level(&nodes[0]), Some(3));
    assert_eq!(heading_level(&nodes[1]), None);
    assert_eq!(heading_level(&nodes[2]), None);
  }

  #[test]
  fn test_stripped_text_joins_pieces() {
    let body = parse_fragment("<h3> 阳光 <i> 花费 </i></h3>");
    let heading = select_first(&body, "h3").unwrap();
    assert_eq!(stripped_text(&heading), "阳光花费");
  }

  #[test]
  fn test_is_blank_reads_text_nodes() {
    let body = parse_fragment("<a> <span>\n</span></a><a><svg></svg></a><a> x </a>");
    let links = select_all(&body, "a");
    assert!(is_blank(&links[0]));
    assert!(is_blank(&links[1]));
    assert!(!is_blank(&links[2]));
  }

  #[test]
  fn test_section_body_stops_at_same_level() {
    let body = parse_fragment(
      "<h2>A</h2><p>1</p><h3>A.1</h3><p>2</p><h2>B</h2><p>3</p>",
    );
    let heading = select_first(&body, "h2").unwrap();
    let texts: Vec<_> = section_body(&heading)
      .iter()
      .map(stripped_text)
      .collect();
    assert_eq!(texts, vec!["1", "A.1", "2"]);
  }

  #[test]
  fn test_class_helpers() {
    let body = parse_fragment("<a class=\"x  y\">t</a>");
    let link = select_first(&body, "a").unwrap();
    assert!(has_class(&link, "y"));
    assert!(!has_class(&link, "x y"));
    add_class(&link, "local-link");
    assert_eq!(attr(&link, "class").as_deref(), Some("x  y local-link"));
  }

  #[test]
  fn test_image_source_prefers_lazy_attribute() {
    let body = parse_fragment(
      r#"<img src="data:image/gif;base64,R0l" data-src="https://img/a.png">"#,
    );
    let img = select_first(&body, "img").unwrap();
    assert_eq!(image_source(&img).as_deref(), Some("https://img/a.png"));
  }
}
