use crate::{config::Config, error::ConfigError};

/// Default configuration in TOML, with a comment for every field. Values
/// must stay in sync with [`Config::default`].
pub const DEFAULT_TOML_TEMPLATE: &str = r##"# Almanac configuration file

# Directory receiving the generated pages, index and stylesheet
output_dir = "docs"

# Subdirectory of output_dir holding downloaded images and their maps
images_subdir = "images"

# Longest page or image filename kept before shortening
max_filename_length = 100

# Wiki the pages are scraped from
base_url = "https://pvz.fandom.com"

# Path prefix of article URLs; bulk page entries that are bare page names
# are appended to base_url + wiki_path_prefix
wiki_path_prefix = "/zh/wiki/"

# User agent sent with every request
user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"

# Timeouts in seconds for page and image requests
request_timeout_secs = 10
image_timeout_secs = 30

# Pause before each image download, in milliseconds
image_delay_ms = 500

# Pause between pages in bulk mode, in milliseconds
page_delay_ms = 1500

# Elements removed from every page before anything else
unwanted_selectors = [
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
]

# Raw infobox elements dropped from the article once the card is rendered
sidebar_selectors = [".pi-item", ".pi-panel", ".portable-infobox"]

# Candidates for the article body, first match wins
main_content_selectors = ["#mw-content-text", ".mw-parser-output"]

# Candidates for the page title, first non-empty match wins
title_selectors = [".mw-page-title-main", "#firstHeading", "h1"]

# Pages whose links point at the generated index instead
home_pages = ["植物大战僵尸中文维基", "Plants_vs._Zombies_Wiki"]

# Pages whose links point at another page's file
[redirects]
"植物大战僵尸Online" = "植物大战僵尸"

# Pages scraped by `almanac bulk`, per content type. Entries are full URLs
# or page names.
[pages]
plants = []
zombies = []
"##;

/// Default configuration in the given format, `toml` or `json`.
///
/// # Errors
///
/// Returns an error for any other format.
pub fn get_template(format: &str) -> Result<String, ConfigError> {
  match format.to_lowercase().as_str() {
    "toml" => Ok(DEFAULT_TOML_TEMPLATE.to_string()),
    "json" => Ok(serde_json::to_string_pretty(&Config::default())?),
    other => {
      Err(ConfigError::Template(format!(
        "Unsupported config format: {other}"
      )))
    },
  }
}
