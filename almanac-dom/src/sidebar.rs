//! The infobox card rendered into the page sidebar.
use kuchikikiki::NodeRef;

use crate::{
  dom,
  infobox::{Fields, InfoboxData, normalize_label},
  types::ContentType,
};

/// Render the sidebar card for `data`.
///
/// The card carries `<prefix>-infobox` on its root, a header with the
/// content type label and title, the infobox image, a game data section of
/// `data-row` entries and a names section of `name-row` entries.
#[must_use]
pub fn render_sidebar(data: &InfoboxData, content_type: ContentType) -> String {
  let prefix = content_type.card_prefix();
  let card = dom::element("div", &[("class", &format!("{prefix}-infobox"))]);

  let header = dom::element("div", &[("class", "infobox-header")]);
  header.append(dom::element_with_text(
    "div",
    &[("class", "header-title")],
    content_type.header_label(),
  ));
  header.append(dom::element_with_text(
    "div",
    &[("class", &format!("{prefix}-name"))],
    &data.title,
  ));
  card.append(header);

  if let Some(image) = &data.image {
    let container =
      dom::element("div", &[("class", &format!("{prefix}-image-container"))]);
    container.append(dom::element("img", &[
      ("src", &image.src),
      ("alt", &image.alt),
      ("class", "infobox-image"),
    ]));
    card.append(container);
  }

  let sections = dom::element("div", &[("class", "infobox-sections")]);
  sections.append(section(
    "游戏数据",
    &data.game_data_without_names(),
    "data",
  ));
  sections.append(section("名称一览", &data.names(), "name"));
  card.append(sections);

  dom::serialize(&card)
}

fn section(title: &str, fields: &Fields, kind: &str) -> NodeRef {
  let section = dom::element("div", &[("class", "info-section")]);
  section.append(dom::element_with_text(
    "div",
    &[("class", "section-header")],
    title,
  ));

  let content = dom::element("div", &[("class", "section-content")]);
  for (label, value) in fields {
    let row = dom::element("div", &[("class", &format!("{kind}-row"))]);
    row.append(dom::element_with_text(
      "div",
      &[("class", &format!("{kind}-label"))],
      normalize_label(label),
    ));
    row.append(dom::element_with_text(
      "div",
      &[("class", &format!("{kind}-value"))],
      value,
    ));
    content.append(row);
  }
  section.append(content);
  section
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;
  use crate::infobox::ImageRef;

  #[test]
  fn test_card_splits_names_from_game_data() {
    let data = InfoboxData {
      title: "豌豆射手".to_string(),
      image: Some(ImageRef {
        src: "https://img/p.png".to_string(),
        alt: "豌豆射手".to_string(),
      }),
      fields: [("阳光花费", "100"), ("英文名称:", "Peashooter")]
        .into_iter()
        .map(|(l, v)| (l.to_string(), v.to_string()))
        .collect(),
      ..InfoboxData::default()
    };

    let html = render_sidebar(&data, ContentType::Plants);
    let card = dom::parse_fragment(&html);

    assert!(dom::select_first(&card, ".plant-infobox").is_some());
    assert_eq!(
      dom::select_first(&card, ".header-title").unwrap().text_contents(),
      "植物图鉴"
    );
    let data_labels: Vec<_> = dom::select_all(&card, ".data-label")
      .iter()
      .map(NodeRef::text_contents)
      .collect();
    assert_eq!(data_labels, vec!["阳光花费"]);
    let name_labels: Vec<_> = dom::select_all(&card, ".name-label")
      .iter()
      .map(NodeRef::text_contents)
      .collect();
    assert_eq!(name_labels, vec!["英文名称"]);
    assert!(dom::select_first(&card, "img.infobox-image").is_some());
  }

  #[test]
  fn test_zombie_card_classes() {
    let html = render_sidebar(&InfoboxData::default(), ContentType::Zombies);
    assert!(html.starts_with("<div class=\"zombie-infobox\">"));
    assert!(html.contains("僵尸图鉴"));
  }
}
