//! Structured data extraction from wiki infoboxes.
//!
//! Infobox markup comes in a few shapes: the portable infobox with
//! `pi-data` rows, older `infobox-data` tables, and portable infoboxes whose
//! rows are grouped under `wds-tabber` tabs. Each element is classified once
//! by its class tokens, and every lookup afterwards works on those roles.
use indexmap::IndexMap;
use kuchikikiki::NodeRef;
use log::debug;
use serde::Serialize;

use crate::dom;

/// Ordered label to value mapping of one group of infobox rows.
pub type Fields = IndexMap<String, String>;

/// Tab labels that mark the names tab.
const NAMES_TAB_KEYWORDS: [&str; 4] = ["名称", "名字", "译名", "names"];

/// Character that marks a field label as a name field.
const NAME_FIELD_MARKER: char = '名';

/// Label keywords that mark a tab as holding game data.
const GAME_DATA_KEYWORDS: [&str; 6] =
  ["花费", "伤害", "强度", "恢复", "射速", "速度"];

/// Page heading selectors tried when the infobox has no usable title.
const PAGE_TITLE_SELECTORS: [&str; 5] = [
  "h1.page-header__title",
  "h1#firstHeading",
  "h1.firstHeading",
  ".mw-page-title-main",
  "h1",
];

/// An image reference taken from the infobox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageRef {
  pub src: String,
  pub alt: String,
}

/// Data pulled out of one infobox.
///
/// A flat infobox only fills `fields`. A tabbed infobox fills `tabs`; its
/// rows also appear in `fields` since every row of the box is read there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoboxData {
  pub title:  String,
  pub image:  Option<ImageRef>,
  pub fields: Fields,
  pub tabs:   IndexMap<String, Fields>,
}

impl InfoboxData {
  #[must_use]
  pub fn is_tabbed(&self) -> bool {
    !self.tabs.is_empty()
  }

  /// `<img>` markup for the infobox image, or an empty string.
  #[must_use]
  pub fn image_html(&self) -> String {
    self.image.as_ref().map_or_else(String::new, |image| {
      dom::serialize(&dom::element("img", &[
        ("src", &image.src),
        ("alt", &image.alt),
        ("class", "infobox-image"),
      ]))
    })
  }

  /// Label of the tab holding the names of the plant or zombie.
  ///
  /// A tab whose label names it as such always wins. Otherwise the first
  /// tab where at least half of the field labels look like name labels.
  #[must_use]
  pub fn names_tab(&self) -> Option<&str> {
    let by_label = self.tabs.keys().find(|label| {
      let label = label.to_lowercase();
      NAMES_TAB_KEYWORDS.iter().any(|keyword| label.contains(keyword))
    });

    let by_fields = || {
      self.tabs.iter().find_map(|(label, fields)| {
        let named = fields
          .keys()
          .filter(|field| field.contains(NAME_FIELD_MARKER))
          .count();
        (!fields.is_empty() && named * 2 >= fields.len()).then_some(label)
      })
    };

    by_label.or_else(by_fields).map(String::as_str)
  }

  /// Fields that make up the game data of the page.
  ///
  /// Tried in order: the second tab when there are several, the first tab
  /// with a game data label, the first tab unrelated to the names tab, and
  /// finally the flat fields without the names tab's labels.
  #[must_use]
  pub fn game_data(&self) -> Fields {
    if let Some((_, fields)) = self.tabs.get_index(1) {
      return fields.clone();
    }

    let names_tab = self.names_tab();
    let names = names_tab.and_then(|label| self.tabs.get(label));

    let with_keyword = self.tabs.values().find(|fields| {
      fields
        .keys()
        .any(|label| GAME_DATA_KEYWORDS.iter().any(|k| label.contains(k)))
    });
    if let Some(fields) = with_keyword {
      return fields.clone();
    }

    let unrelated = self.tabs.iter().find(|(label, fields)| {
      Some(label.as_str()) != names_tab
        && names.is_none_or(|names| {
          !fields.keys().any(|field| names.contains_key(field))
        })
    });
    if let Some((_, fields)) = unrelated {
      return fields.clone();
    }

    self
      .fields
      .iter()
      .filter(|(label, _)| names.is_none_or(|names| !names.contains_key(*label)))
      .map(|(label, value)| (label.clone(), value.clone()))
      .collect()
  }

  /// Name fields: the names tab when there is one, otherwise the flat
  /// fields whose label reads as a name label.
  #[must_use]
  pub fn names(&self) -> Fields {
    if let Some(fields) = self.names_tab().and_then(|label| self.tabs.get(label))
    {
      return fields.clone();
    }

    self
      .fields
      .iter()
      .filter(|(label, _)| is_name_label(label))
      .map(|(label, value)| (label.clone(), value.clone()))
      .collect()
  }

  /// Game data with every name field taken out.
  #[must_use]
  pub fn game_data_without_names(&self) -> Fields {
    let names = self.names();
    self
      .game_data()
      .into_iter()
      .filter(|(label, _)| !names.contains_key(label) && !is_name_label(label))
      .collect()
  }
}

/// Strip surrounding whitespace and trailing colons from a field label.
#[must_use]
pub fn normalize_label(label: &str) -> &str {
  label.trim().trim_end_matches([':', '：']).trim_end()
}

/// Whether a field label names the subject, e.g. `英文名称`.
#[must_use]
pub fn is_name_label(label: &str) -> bool {
  let label = normalize_label(label);
  ["名称", "名字", "译名"].iter().any(|k| label.contains(k))
}

/// Structural role of an infobox element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
  Title,
  AltTitle,
  Row,
  Label,
  Value,
  LegacyRow,
  LegacyLabel,
  LegacyValue,
  Tabber,
  TabLabel,
  TabPanel,
}

fn roles_of(node: &NodeRef) -> Vec<Role> {
  let Some(tag) = dom::tag_name(node) else {
    return Vec::new();
  };
  let tag = tag.as_str();
  let class = dom::attr(node, "class").unwrap_or_default();
  let tokens: Vec<&str> = class.split_ascii_whitespace().collect();
  let has = |name: &str| tokens.contains(&name);

  let mut roles = Vec::new();
  if tag == "h2" && has("pi-title") {
    roles.push(Role::Title);
  }
  if matches!(tag, "h1" | "h2" | "div") && (has("pi-title") || has("infobox-title"))
  {
    roles.push(Role::AltTitle);
  }
  if tag == "div" && has("pi-data") {
    roles.push(Role::Row);
  }
  if tag == "h3" && has("pi-data-label") {
    roles.push(Role::Label);
  }
  if tag == "div" && has("pi-data-value") {
    roles.push(Role::Value);
  }
  if matches!(tag, "div" | "tr") && (has("pi-data") || has("infobox-data")) {
    roles.push(Role::LegacyRow);
  }
  if matches!(tag, "div" | "td" | "h3")
    && (has("pi-data-label") || has("infobox-label"))
  {
    roles.push(Role::LegacyLabel);
  }
  if matches!(tag, "div" | "td")
    && (has("pi-data-value") || has("infobox-value"))
  {
    roles.push(Role::LegacyValue);
  }
  if has("wds-tabber") {
    roles.push(Role::Tabber);
  }
  if has("wds-tabs__tab-label") {
    roles.push(Role::TabLabel);
  }
  if has("wds-tab__content") {
    roles.push(Role::TabPanel);
  }
  roles
}

/// The elements of one infobox tagged with their roles, in document order.
struct Classified {
  nodes: Vec<(NodeRef, Vec<Role>)>,
}

impl Classified {
  fn new(infobox: &NodeRef) -> Self {
    let nodes = infobox
      .inclusive_descendants()
      .filter_map(|node| {
        let roles = roles_of(&node);
        (!roles.is_empty()).then_some((node, roles))
      })
      .collect();
    Self { nodes }
  }

  fn all(&self, role: Role) -> impl Iterator<Item = &NodeRef> {
    self
      .nodes
      .iter()
      .filter(move |(_, roles)| roles.contains(&role))
      .map(|(node, _)| node)
  }

  fn within<'a>(
    &'a self,
    scope: &'a NodeRef,
    role: Role,
  ) -> impl Iterator<Item = &'a NodeRef> {
    self
      .all(role)
      .filter(move |node| *node != scope && dom::is_within(node, scope))
  }

  fn rows(&self, scope: &NodeRef, roles: [Role; 3]) -> Fields {
    let [row_role, label_role, value_role] = roles;
    let mut fields = Fields::new();
    for row in self.within(scope, row_role) {
      let label = self.within(row, label_role).next().map(dom::stripped_text);
      let value = self.within(row, value_role).next().map(dom::stripped_text);
      if let (Some(label), Some(value)) = (label, value)
        && !label.is_empty()
        && !value.is_empty()
      {
        fields.insert(label, value);
      }
    }
    fields
  }

  fn fields(&self, scope: &NodeRef) -> Fields {
    let fields = self.rows(scope, [Role::Row, Role::Label, Role::Value]);
    if !fields.is_empty() {
      return fields;
    }
    self.rows(scope, [
      Role::LegacyRow,
      Role::LegacyLabel,
      Role::LegacyValue,
    ])
  }

  fn tabs(&self, infobox: &NodeRef) -> IndexMap<String, Fields> {
    let Some(tabber) = self.all(Role::Tabber).next() else {
      return IndexMap::new();
    };

    let labels = self.within(tabber, Role::TabLabel);
    let panels = self.within(tabber, Role::TabPanel);

    let tabs: IndexMap<String, Fields> = labels
      .zip(panels)
      .filter_map(|(label, panel)| {
        let label = dom::stripped_text(label);
        (!label.is_empty()).then(|| (label, self.fields(panel)))
      })
      .collect();

    if tabs.is_empty() {
      debug!(
        "Tab container without labelled panels in infobox <{}>",
        dom::tag_name(infobox).unwrap_or_default()
      );
    }
    tabs
  }

  fn title(&self) -> Option<String> {
    self
      .all(Role::Title)
      .next()
      .or_else(|| self.all(Role::AltTitle).next())
      .map(dom::stripped_text)
      .filter(|title| usable_title(title))
  }
}

fn usable_title(title: &str) -> bool {
  title.chars().count() > 1
}

/// Locate the infobox below `root`.
///
/// Prefers the portable infobox, then any `div`/`table` whose class mentions
/// an infobox or a portable-infobox item.
#[must_use]
pub fn find_infobox(root: &NodeRef) -> Option<NodeRef> {
  dom::select_first(root, "aside.portable-infobox").or_else(|| {
    dom::select_all(root, "div[class], table[class]")
      .into_iter()
      .find(|node| {
        dom::attr(node, "class").is_some_and(|class| {
          class
            .split_ascii_whitespace()
            .any(|token| token.contains("infobox") || token.contains("pi-item"))
        })
      })
  })
}

/// Title from the page heading, for infoboxes without a usable title.
#[must_use]
pub fn page_title_fallback(node: &NodeRef) -> String {
  let document = dom::document_of(node);
  PAGE_TITLE_SELECTORS
    .iter()
    .filter_map(|selector| dom::select_first(&document, selector))
    .map(|heading| dom::stripped_text(&heading))
    .find(|title| usable_title(title))
    .unwrap_or_default()
}

/// Extract [`InfoboxData`] from an infobox element.
#[must_use]
pub fn extract(infobox: &NodeRef) -> InfoboxData {
  let classified = Classified::new(infobox);

  let title = classified
    .title()
    .unwrap_or_else(|| page_title_fallback(infobox));

  let image = dom::select_first(infobox, "img").and_then(|img| {
    let src = dom::image_source(&img)?;
    let alt = if title.is_empty() {
      dom::attr(&img, "alt").unwrap_or_default()
    } else {
      title.clone()
    };
    Some(ImageRef { src, alt })
  });

  let data = InfoboxData {
    fields: classified.fields(infobox),
    tabs: classified.tabs(infobox),
    image,
    title,
  };

  debug!(
    "Extracted infobox '{}' with {} fields and {} tabs",
    data.title,
    data.fields.len(),
    data.tabs.len()
  );
  data
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  fn row(label: &str, value: &str) -> String {
    format!(
      r#"<div class="pi-item pi-data"><h3 class="pi-data-label">{label}</h3><div class="pi-data-value">{value}</div></div>"#
    )
  }

  fn tabbed(tabs: &[(&str, &[(&str, &str)])]) -> InfoboxData {
    let labels: String = tabs
      .iter()
      .map(|(label, _)| {
        format!(r#"<li class="wds-tabs__tab"><div class="wds-tabs__tab-label">{label}</div></li>"#)
      })
      .collect();
    let panels: String = tabs
      .iter()
      .map(|(_, rows)| {
        let rows: String = rows.iter().map(|(l, v)| row(l, v)).collect();
        format!(r#"<div class="wds-tab__content">{rows}</div>"#)
      })
      .collect();
    let html = format!(
      r#"<aside class="portable-infobox"><h2 class="pi-title">测试</h2>
      <section class="pi-panel wds-tabber"><ul class="wds-tabs">{labels}</ul>{panels}</section></aside>"#
    );
    let body = dom::parse_fragment(&html);
    extract(&find_infobox(&body).unwrap())
  }

  #[test]
  fn test_flat_infobox() {
    let html = format!(
      r#"<aside class="portable-infobox"><h2 class="pi-title">豌豆射手</h2>
      <figure class="pi-image"><img src="data:x" data-src="https://img/p.png"></figure>
      {}{}{}</aside>"#,
      row("阳光花费", "100"),
      row("伤害", " 20 "),
      row("阳光花费", "125"),
    );
    let body = dom::parse_fragment(&html);
    let data = extract(&find_infobox(&body).unwrap());

    assert_eq!(data.title, "豌豆射手");
    assert_eq!(data.image.as_ref().unwrap().src, "https://img/p.png");
    assert_eq!(data.fields.get("阳光花费").unwrap(), "125");
    assert_eq!(data.fields.get("伤害").unwrap(), "20");
    assert!(!data.is_tabbed());
  }

  #[test]
  fn test_legacy_table_rows() {
    let body = dom::parse_fragment(
      r#"<table class="infobox"><tr class="infobox-data"><td class="infobox-label">强度</td><td class="infobox-value">181</td></tr></table>"#,
    );
    let data = extract(&find_infobox(&body).unwrap());
    assert_eq!(data.fields.get("强度").unwrap(), "181");
  }

  #[test]
  fn test_title_falls_back_to_page_heading() {
    let document = dom::parse_document(
      r#"<h1 id="firstHeading">坚果墙</h1><aside class="portable-infobox"><h2 class="pi-title">x</h2></aside>"#,
    );
    let infobox = find_infobox(&document).unwrap();
    assert_eq!(extract(&infobox).title, "坚果墙");
  }

  #[test]
  fn test_title_empty_without_any_heading() {
    let body = dom::parse_fragment(r#"<aside class="portable-infobox"></aside>"#);
    assert_eq!(extract(&find_infobox(&body).unwrap()).title, "");
  }

  #[test]
  fn test_names_tab_by_label_beats_position() {
    // The first tab would pass the field marker test on its own.
    let data = tabbed(&[
      ("其他", &[("英文名称", "Pea Shooter"), ("日文名称", "ピー")]),
      ("植物大战僵尸2", &[("阳光花费", "100"), ("射速", "1.5秒")]),
      ("名称", &[("英文", "Peashooter")]),
    ]);
    assert_eq!(data.names_tab(), Some("名称"));
    assert_eq!(data.names().get("英文").unwrap(), "Peashooter");
  }

  #[test]
  fn test_names_tab_by_field_marker() {
    let data = tabbed(&[
      ("数据", &[("伤害", "20")]),
      ("其他", &[("英文名称", "Peashooter"), ("日文名称", "ピーシューター")]),
    ]);
    assert_eq!(data.names_tab(), Some("其他"));
  }

  #[test]
  fn test_game_data_prefers_second_tab() {
    let data = tabbed(&[
      ("一代", &[("阳光花费", "100")]),
      ("二代", &[("阳光花费", "100"), ("伤害", "20")]),
    ]);
    assert_eq!(data.game_data().len(), 2);
  }

  #[test]
  fn test_game_data_single_tab_by_keyword() {
    let data = tabbed(&[("数据", &[("伤害", "20")])]);
    assert_eq!(data.game_data().get("伤害").unwrap(), "20");
  }

  #[test]
  fn test_game_data_flat_excludes_names_tab() {
    let data = tabbed(&[("名称", &[("英文名称", "Peashooter")])]);
    // The names tab is the only tab, so the flat fields are used without it.
    assert!(data.game_data().is_empty());
    assert!(data.game_data_without_names().is_empty());
  }

  #[test]
  fn test_normalize_label() {
    assert_eq!(normalize_label(" 英文名称: "), "英文名称");
    assert_eq!(normalize_label("强度："), "强度");
  }
}
