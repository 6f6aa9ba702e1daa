//! Synthesis of the normalized three-column almanac block.
//!
//! Pages come with the in-game almanac in one of four states: missing
//! entirely, a heading followed by loose text, a heading with nothing usable
//! below it, or a populated `almanac-plant`/`almanac-zombie` block. Every
//! state except the third is replaced by the same block layout: an optional
//! image, then the introduction, game data and names columns.
use kuchikikiki::NodeRef;
use log::{debug, info};

use crate::{
  dom,
  infobox::{Fields, ImageRef, InfoboxData, normalize_label},
};

/// Game data labels shown for flat infoboxes, in display order.
pub const LEGACY_GAME_DATA_LABELS: [&str; 11] = [
  "阳光花费",
  "恢复时间",
  "伤害",
  "强度",
  "射速",
  "解锁方式",
  "报纸强度",
  "速度",
  "特殊",
  "首次出场",
  "出场",
];

/// Name labels shown for flat infoboxes, in display order.
pub const LEGACY_NAME_LABELS: [&str; 3] = ["英文名称", "中文名称", "其他名称"];

/// Game data labels shown for tabbed infoboxes, in display order.
pub const TABBED_GAME_DATA_LABELS: [&str; 16] = [
  "阳光花费",
  "恢复时间",
  "冷却时间",
  "伤害",
  "射程",
  "射速",
  "范围",
  "强度",
  "韧性",
  "速度",
  "用途",
  "特点",
  "特殊",
  "解锁方式",
  "首次出场",
  "出场",
];

/// Name labels shown for tabbed infoboxes, in display order.
pub const TABBED_NAME_LABELS: [&str; 5] =
  ["英文名称", "中文名称", "日文名称", "其他名称", "曾用名"];

/// Heading text of the almanac section.
pub const ALMANAC_HEADING: &str = "图鉴";

/// Heading text of the section the block is placed in front of.
const BEHAVIOR_HEADING: &str = "表现";

/// Marker of a placeholder image left behind by a broken file link.
const FILE_PLACEHOLDER: &str = "[[File:";

/// Prefix of images already stored in the local image cache.
const LOCAL_IMAGE_MARKER: &str = "./images/image_";

/// What the synthesizer did with a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlmanacShape {
  /// No almanac markup; the block was built from the infobox alone.
  Synthesized,

  /// The almanac heading only had loose text, which became the
  /// introduction.
  PlainText,

  /// An almanac heading with nothing usable below it; left as is.
  Untouched,

  /// A populated almanac block was reorganized.
  Reorganized,
}

/// The normalized almanac block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlmanacBlock {
  pub image:        Option<ImageRef>,
  pub introduction: Option<String>,
  pub flavor_text:  Option<String>,
  pub game_data:    Vec<(String, String)>,
  pub names:        Vec<(String, String)>,
}

/// Pick the fields listed in `labels`, in that order, matching labels with
/// trailing colons stripped.
fn pick(fields: &Fields, labels: &[&str]) -> Vec<(String, String)> {
  labels
    .iter()
    .filter_map(|wanted| {
      fields
        .iter()
        .find(|(label, _)| normalize_label(label) == *wanted)
        .map(|(_, value)| ((*wanted).to_string(), value.clone()))
    })
    .collect()
}

impl AlmanacBlock {
  /// Build the block columns from infobox data.
  ///
  /// Tabbed infoboxes contribute their selected game data and names tabs,
  /// flat infoboxes all their fields. Either way each column only keeps
  /// the labels of its variant's list.
  #[must_use]
  pub fn from_infobox(data: &InfoboxData, introduction: Option<String>) -> Self {
    let (game_data, names) = if data.is_tabbed() {
      (
        pick(&data.game_data_without_names(), &TABBED_GAME_DATA_LABELS),
        pick(&data.names(), &TABBED_NAME_LABELS),
      )
    } else {
      (
        pick(&data.fields, &LEGACY_GAME_DATA_LABELS),
        pick(&data.fields, &LEGACY_NAME_LABELS),
      )
    };

    Self {
      image: data.image.clone(),
      introduction: introduction.filter(|text| !text.trim().is_empty()),
      flavor_text: None,
      game_data,
      names,
    }
  }

  /// The `<h2>` heading placed above the block.
  #[must_use]
  pub fn heading() -> NodeRef {
    let heading = dom::element("h2", &[]);
    heading.append(dom::element_with_text(
      "span",
      &[("class", "mw-headline"), ("id", ALMANAC_HEADING)],
      ALMANAC_HEADING,
    ));
    heading
  }

  /// Render the block as a detached element.
  #[must_use]
  pub fn to_node(&self) -> NodeRef {
    let block = dom::element("div", &[("class", "reorganized-almanac")]);

    if let Some(image) = &self.image {
      let section = dom::element("div", &[("class", "almanac-image-section")]);
      section.append(dom::element("img", &[
        ("src", &image.src),
        ("alt", &image.alt),
        ("class", "almanac-main-image"),
      ]));
      block.append(section);
    }

    let columns = dom::element("div", &[("class", "three-column-info")]);

    let intro = column("intro-column", "简介");
    if let Some(text) = &self.introduction {
      intro.append(dom::element_with_text("p", &[], text));
    }
    if let Some(text) = &self.flavor_text {
      intro.append(dom::element_with_text("p", &[("class", "flavor-text")], text));
    }
    columns.append(intro);

    let data = column("data-column", "游戏数据");
    for (label, value) in &self.game_data {
      data.append(item("data", label, value));
    }
    columns.append(data);

    let names = column("names-column", "名称一览");
    for (label, value) in &self.names {
      names.append(item("name", label, value));
    }
    columns.append(names);

    block.append(columns);
    block
  }

  /// Render the block as HTML.
  #[must_use]
  pub fn to_html(&self) -> String {
    dom::serialize(&self.to_node())
  }
}

fn column(class: &str, title: &str) -> NodeRef {
  let column =
    dom::element("div", &[("class", &format!("info-column {class}"))]);
  column.append(dom::element_with_text("h3", &[], title));
  column
}

fn item(kind: &str, label: &str, value: &str) -> NodeRef {
  let item = dom::element("div", &[("class", &format!("{kind}-item"))]);
  item.append(dom::element_with_text(
    "span",
    &[("class", &format!("{kind}-label"))],
    label,
  ));
  item.append(NodeRef::new_text(": "));
  item.append(dom::element_with_text(
    "span",
    &[("class", &format!("{kind}-value"))],
    value,
  ));
  item
}

/// Rebuilds the almanac section of one page.
///
/// `root` is the article content. `infobox` is the raw infobox element, if
/// any, which is never used as an insertion point since it is removed from
/// the article afterwards.
pub struct AlmanacSynthesizer<'a> {
  root:    &'a NodeRef,
  data:    &'a InfoboxData,
  infobox: Option<&'a NodeRef>,
}

impl<'a> AlmanacSynthesizer<'a> {
  #[must_use]
  pub const fn new(
    root: &'a NodeRef,
    data: &'a InfoboxData,
    infobox: Option<&'a NodeRef>,
  ) -> Self {
    Self {
      root,
      data,
      infobox,
    }
  }

  /// Detect the almanac shape of the page and rewrite it.
  pub fn run(&self) -> AlmanacShape {
    let heading = dom::find_heading(self.root, &[ALMANAC_HEADING], Some(2));
    let content = dom::select_first(self.root, ".almanac-plant")
      .or_else(|| dom::select_first(self.root, ".almanac-zombie"));

    let shape = match (heading, content) {
      (None, None) => {
        self.insert(&AlmanacBlock::from_infobox(self.data, None));
        AlmanacShape::Synthesized
      },
      (Some(heading), None) => self.plain_text(&heading),
      (heading, Some(content)) => {
        self.reorganize(heading.as_ref(), &content);
        AlmanacShape::Reorganized
      },
    };

    debug!("Almanac shape: {shape:?}");
    shape
  }

  fn plain_text(&self, heading: &NodeRef) -> AlmanacShape {
    let body = dom::section_body(heading);
    let text = body
      .iter()
      .map(dom::stripped_text)
      .filter(|text| !text.is_empty())
      .collect::<Vec<_>>()
      .join(" ");

    if text.is_empty() {
      info!("Almanac heading without content, leaving it untouched");
      return AlmanacShape::Untouched;
    }

    dom::detach_all(body);
    heading.detach();
    self.insert(&AlmanacBlock::from_infobox(self.data, Some(text)));
    AlmanacShape::PlainText
  }

  fn reorganize(&self, heading: Option<&NodeRef>, content: &NodeRef) {
    let mut block = AlmanacBlock::from_infobox(self.data, None);
    block.image = self.almanac_image(content).or(block.image);

    if let Some(description) = dom::select_first(
      content,
      ".almanac-plant-description, .almanac-zombie-description",
    ) {
      let text_of = |selector: &str| {
        dom::select_first(&description, selector)
          .map(|node| dom::stripped_text(&node))
          .filter(|text| !text.is_empty())
      };
      block.introduction = text_of(".almanac-description-header");
      block.flavor_text = text_of(".almanac-description-flavor");
    }

    if let Some(heading) = heading {
      heading.detach();
    }
    content.detach();
    self.insert(&block);
  }

  /// The almanac's own image when it is real, otherwise the infobox image,
  /// otherwise any locally cached image of the page.
  fn almanac_image(&self, content: &NodeRef) -> Option<ImageRef> {
    let own = dom::select_first(
      content,
      ".almanac-plant-image, .almanac-zombie-image",
    )
    .filter(|container| !dom::serialize(container).contains(FILE_PLACEHOLDER))
    .and_then(|container| dom::select_first(&container, "img"))
    .and_then(|img| image_ref(&img));

    own
      .or_else(|| self.data.image.clone())
      .or_else(|| self.local_image())
  }

  fn local_image(&self) -> Option<ImageRef> {
    dom::select_all(self.root, "img")
      .iter()
      .find(|img| {
        dom::attr(img, "src").is_some_and(|src| src.contains(LOCAL_IMAGE_MARKER))
      })
      .and_then(image_ref)
  }

  /// Place heading and block before the behavior section, after the first
  /// paragraph, or at the start of the article, whichever exists first.
  fn insert(&self, block: &AlmanacBlock) {
    let heading = AlmanacBlock::heading();
    let node = block.to_node();

    if let Some(behavior) =
      dom::find_heading(self.root, &[BEHAVIOR_HEADING], Some(2))
    {
      behavior.insert_before(heading);
      behavior.insert_before(node);
      return;
    }

    let first_paragraph =
      dom::select_all(self.root, "p").into_iter().find(|p| {
        self
          .infobox
          .is_none_or(|infobox| !dom::is_within(p, infobox))
      });
    if let Some(paragraph) = first_paragraph {
      paragraph.insert_after(node);
      paragraph.insert_after(heading);
      return;
    }

    let container = dom::select_first(self.root, ".mw-parser-output")
      .unwrap_or_else(|| self.root.clone());
    container.prepend(node);
    container.prepend(heading);
  }
}

fn image_ref(img: &NodeRef) -> Option<ImageRef> {
  Some(ImageRef {
    src: dom::image_source(img)?,
    alt: dom::attr(img, "alt").unwrap_or_default(),
  })
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  fn peashooter() -> InfoboxData {
    InfoboxData {
      title: "豌豆射手".to_string(),
      fields: [("阳光花费", "100"), ("伤害", "20"), ("英文名称", "Peashooter")]
        .into_iter()
        .map(|(l, v)| (l.to_string(), v.to_string()))
        .collect(),
      ..InfoboxData::default()
    }
  }

  fn column_texts(root: &NodeRef, class: &str) -> Vec<String> {
    dom::select_all(root, &format!(".{class} > div"))
      .iter()
      .map(|node| node.text_contents())
      .collect()
  }

  #[test]
  fn test_synthesized_from_flat_infobox() {
    let root = dom::parse_fragment("<p>豌豆射手是一种植物。</p><h2>表现</h2><p>x</p>");
    let shape = AlmanacSynthesizer::new(&root, &peashooter(), None).run();
    assert_eq!(shape, AlmanacShape::Synthesized);

    let intro = dom::select_first(&root, ".intro-column").unwrap();
    assert_eq!(intro.children().count(), 1);
    assert_eq!(column_texts(&root, "data-column"), vec![
      "阳光花费: 100",
      "伤害: 20"
    ]);
    assert_eq!(column_texts(&root, "names-column"), vec![
      "英文名称: Peashooter"
    ]);

    // Block sits right before the behavior heading.
    let behavior = dom::find_heading(&root, &["表现"], Some(2)).unwrap();
    let previous = behavior.previous_sibling().unwrap();
    assert!(dom::has_class(&previous, "reorganized-almanac"));
  }

  #[test]
  fn test_plain_text_almanac_becomes_introduction() {
    let root = dom::parse_fragment(
      "<p>lead</p><h2>图鉴</h2><p>它会射豌豆。</p><p>很可靠。</p><h2>花絮</h2>",
    );
    let shape = AlmanacSynthesizer::new(&root, &peashooter(), None).run();
    assert_eq!(shape, AlmanacShape::PlainText);

    let intro = dom::select_first(&root, ".intro-column p").unwrap();
    assert_eq!(intro.text_contents(), "它会射豌豆。 很可靠。");
    assert_eq!(dom::select_all(&root, "h2").len(), 2);
    assert_eq!(dom::select_all(&root, "p").len(), 2);
  }

  #[test]
  fn test_empty_almanac_heading_is_untouched() {
    let html = "<p>lead</p><h2>图鉴</h2><h2>花絮</h2>";
    let root = dom::parse_fragment(html);
    let shape = AlmanacSynthesizer::new(&root, &peashooter(), None).run();
    assert_eq!(shape, AlmanacShape::Untouched);
    assert_eq!(dom::serialize(&root), html);
  }

  #[test]
  fn test_populated_almanac_is_reorganized() {
    let root = dom::parse_fragment(
      r#"<p>lead</p><h2>图鉴</h2>
      <div class="almanac-plant">
        <div class="almanac-plant-image">[[File:Peashooter.png|]]<img src="x.png"></div>
        <div class="almanac-plant-description">
          <p class="almanac-description-header">豌豆射手是你的第一道防线。</p>
          <p class="almanac-description-flavor">“我就是那么棒！”</p>
        </div>
      </div>"#,
    );
    let mut data = peashooter();
    data.image = Some(ImageRef {
      src: "https://img/peashooter.png".to_string(),
      alt: "豌豆射手".to_string(),
    });

    let shape = AlmanacSynthesizer::new(&root, &data, None).run();
    assert_eq!(shape, AlmanacShape::Reorganized);
    assert!(dom::select_first(&root, ".almanac-plant").is_none());

    let image = dom::select_first(&root, "img.almanac-main-image").unwrap();
    assert_eq!(
      dom::attr(&image, "src").as_deref(),
      Some("https://img/peashooter.png")
    );

    let intro: Vec<_> = dom::select_all(&root, ".intro-column p")
      .iter()
      .map(NodeRef::text_contents)
      .collect();
    assert_eq!(intro, vec!["豌豆射手是你的第一道防线。", "“我就是那么棒！”"]);

    // Heading and block follow the first paragraph.
    let lead = dom::select_first(&root, "p").unwrap();
    let next: Vec<_> = lead.following_siblings().take(2).collect();
    assert!(dom::is_tag(&next[0], "h2"));
    assert!(dom::has_class(&next[1], "reorganized-almanac"));
  }

  #[test]
  fn test_columns_always_present() {
    let root = dom::parse_fragment("");
    AlmanacSynthesizer::new(&root, &InfoboxData::default(), None).run();
    for class in ["intro-column", "data-column", "names-column"] {
      assert!(dom::select_first(&root, &format!(".{class} > h3")).is_some());
    }
  }

  #[test]
  fn test_tabbed_columns_use_selected_tabs() {
    let mut data = InfoboxData::default();
    data.tabs.insert(
      "名称".to_string(),
      [("英文名称", "Peashooter"), ("日文名称", "ピーシューター")]
        .into_iter()
        .map(|(l, v)| (l.to_string(), v.to_string()))
        .collect(),
    );
    data.tabs.insert(
      "数据".to_string(),
      [("阳光花费：", "100"), ("英文名称", "Peashooter")]
        .into_iter()
        .map(|(l, v)| (l.to_string(), v.to_string()))
        .collect(),
    );

    let block = AlmanacBlock::from_infobox(&data, None);
    assert_eq!(block.game_data, vec![(
      "阳光花费".to_string(),
      "100".to_string()
    )]);
    assert_eq!(block.names.len(), 2);
  }

  #[test]
  fn test_tabbed_columns_drop_unlisted_labels() {
    let fields = |pairs: &[(&str, &str)]| -> Fields {
      pairs
        .iter()
        .map(|(l, v)| ((*l).to_string(), (*v).to_string()))
        .collect()
    };
    let mut data = InfoboxData::default();
    data
      .tabs
      .insert("一代".to_string(), fields(&[("阳光花费", "100")]));
    data.tabs.insert(
      "二代".to_string(),
      fields(&[
        ("阳光花费", "100"),
        ("备注", "随便写的"),
        ("配音演员", "某人"),
      ]),
    );
    data.tabs.insert(
      "名称".to_string(),
      fields(&[("英文名称", "Peashooter"), ("口头禅", "pew")]),
    );

    let block = AlmanacBlock::from_infobox(&data, None);
    assert_eq!(block.game_data, vec![(
      "阳光花费".to_string(),
      "100".to_string()
    )]);
    assert_eq!(block.names, vec![(
      "英文名称".to_string(),
      "Peashooter".to_string()
    )]);
  }
}
