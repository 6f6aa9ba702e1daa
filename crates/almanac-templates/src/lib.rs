use std::collections::HashMap;

pub const PAGE_TEMPLATE: &str = include_str!("../templates/page.html");
pub const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

pub const STYLE_CSS: &str = include_str!("../templates/style.css");

/// Path of the stylesheet relative to the output directory.
pub const STYLESHEET_PATH: &str = "styles/style.css";

#[must_use]
pub fn all_templates() -> HashMap<&'static str, &'static str> {
  let mut templates = HashMap::new();
  templates.insert("page.html", PAGE_TEMPLATE);
  templates.insert("index.html", INDEX_TEMPLATE);
  templates.insert("style.css", STYLE_CSS);
  templates
}
