use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

use almanac_dom::{
  CleanOptions,
  ContentType,
  LinkRewriter,
  cleaner::{
    DEFAULT_CONTENT_SELECTORS,
    DEFAULT_SIDEBAR_SELECTORS,
    DEFAULT_UNWANTED_SELECTORS,
  },
};
use almanac_images::CacheOptions;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ConfigError;

/// Default user agent, a desktop browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS \
                                      X 10_15_7) AppleWebKit/537.36 (KHTML, \
                                      like Gecko) Chrome/120.0.0.0 \
                                      Safari/537.36";

/// Shortest accepted `max_filename_length`.
pub const MIN_FILENAME_LENGTH: usize = 16;

/// Names looked up in the working directory when no file is given.
const CONFIG_FILENAMES: [&str; 6] = [
  "almanac.toml",
  "almanac.json",
  ".almanac.toml",
  ".almanac.json",
  ".config/almanac.toml",
  ".config/almanac.json",
];

/// Configuration for the almanac scraper.
///
/// Every field has a default, so a config file only needs the keys it
/// changes. Files are TOML or JSON; several files merge key by key, later
/// files winning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Directory receiving the generated pages.
  pub output_dir: PathBuf,

  /// Subdirectory of `output_dir` holding downloaded images.
  pub images_subdir: String,

  /// Longest page or image filename kept before shortening.
  pub max_filename_length: usize,

  /// Root of the wiki, e.g. `https://pvz.fandom.com`.
  pub base_url: String,

  /// Path prefix of article URLs.
  pub wiki_path_prefix: String,

  pub user_agent: String,

  /// Timeout for page requests, in seconds.
  pub request_timeout_secs: u64,

  /// Timeout for image requests, in seconds.
  pub image_timeout_secs: u64,

  /// Pause before each image download, in milliseconds.
  pub image_delay_ms: u64,

  /// Pause between pages in bulk mode, in milliseconds.
  pub page_delay_ms: u64,

  /// Elements removed from every page before cleaning.
  pub unwanted_selectors: Vec<String>,

  /// Raw infobox elements dropped from the article.
  pub sidebar_selectors: Vec<String>,

  /// Candidates for the article body, first match wins.
  pub main_content_selectors: Vec<String>,

  /// Candidates for the page title, first non-empty match wins.
  pub title_selectors: Vec<String>,

  /// Pages whose links point at the generated index.
  pub home_pages: Vec<String>,

  /// Pages whose links point at another page's file.
  pub redirects: IndexMap<String, String>,

  /// Bulk page lists per content type. Entries are URLs or page names.
  pub pages: IndexMap<String, Vec<String>>,
}

impl Default for Config {
  fn default() -> Self {
    let strings = |items: &[&str]| -> Vec<String> {
      items.iter().map(|s| (*s).to_string()).collect()
    };

    Self {
      output_dir:             PathBuf::from("docs"),
      images_subdir:          "images".to_string(),
      max_filename_length:    100,
      base_url:               "https://pvz.fandom.com".to_string(),
      wiki_path_prefix:       "/zh/wiki/".to_string(),
      user_agent:             DEFAULT_USER_AGENT.to_string(),
      request_timeout_secs:   10,
      image_timeout_secs:     30,
      image_delay_ms:         500,
      page_delay_ms:          1500,
      unwanted_selectors:     strings(&DEFAULT_UNWANTED_SELECTORS),
      sidebar_selectors:      strings(&DEFAULT_SIDEBAR_SELECTORS),
      main_content_selectors: strings(&DEFAULT_CONTENT_SELECTORS),
      title_selectors:        strings(&[
        ".mw-page-title-main",
        "#firstHeading",
        "h1",
      ]),
      home_pages:             strings(&[
        "植物大战僵尸中文维基",
        "Plants_vs._Zombies_Wiki",
      ]),
      redirects:              IndexMap::from([(
        "植物大战僵尸Online".to_string(),
        "植物大战僵尸".to_string(),
      )]),
      pages:                  IndexMap::from([
        (ContentType::Plants.to_string(), Vec::new()),
        (ContentType::Zombies.to_string(), Vec::new()),
      ]),
    }
  }
}

impl Config {
  /// Load configuration from a file (TOML or JSON).
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let value = read_value(path.as_ref())?;
    Self::from_value(value, path.as_ref())
  }

  fn from_value(value: Value, origin: &Path) -> Result<Self, ConfigError> {
    serde_json::from_value(value).map_err(|e| {
      ConfigError::Config(format!(
        "Invalid configuration in {}: {e}",
        origin.display()
      ))
    })
  }

  /// Load configuration from the given files, or a discovered one, then
  /// apply `KEY=VALUE` overrides and validate.
  ///
  /// Several files are merged in order: a later file replaces only the keys
  /// it sets. Tables merge recursively, lists and scalars are replaced.
  ///
  /// # Errors
  ///
  /// Returns an error if a file cannot be loaded, an override is invalid, or
  /// the result fails validation.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = if let Some((first, rest)) = config_files.split_first() {
      let mut merged = read_value(first)?;
      for path in rest {
        merge_values(&mut merged, read_value(path)?);
      }

      if config_files.len() > 1 {
        log::info!("Loaded and merged {} config files", config_files.len());
      }

      let origin = config_files.last().unwrap_or(first);
      Self::from_value(merged, origin)?
    } else if let Some(discovered) = Self::find_config_file() {
      log::info!("Using discovered config file: {}", discovered.display());
      Self::from_file(&discovered)?
    } else {
      Self::default()
    };

    config.apply_overrides(config_overrides)?;
    config.validate()?;
    Ok(config)
  }

  /// Merge another config into this one, with the other config's values
  /// taking precedence.
  ///
  /// Plain fields and lists are replaced. Map fields (`redirects`, `pages`)
  /// are merged per key.
  pub fn merge(&mut self, other: Self) {
    let Self {
      output_dir,
      images_subdir,
      max_filename_length,
      base_url,
      wiki_path_prefix,
      user_agent,
      request_timeout_secs,
      image_timeout_secs,
      image_delay_ms,
      page_delay_ms,
      unwanted_selectors,
      sidebar_selectors,
      main_content_selectors,
      title_selectors,
      home_pages,
      redirects,
      pages,
    } = other;

    self.output_dir = output_dir;
    self.images_subdir = images_subdir;
    self.max_filename_length = max_filename_length;
    self.base_url = base_url;
    self.wiki_path_prefix = wiki_path_prefix;
    self.user_agent = user_agent;
    self.request_timeout_secs = request_timeout_secs;
    self.image_timeout_secs = image_timeout_secs;
    self.image_delay_ms = image_delay_ms;
    self.page_delay_ms = page_delay_ms;
    self.unwanted_selectors = unwanted_selectors;
    self.sidebar_selectors = sidebar_selectors;
    self.main_content_selectors = main_content_selectors;
    self.title_selectors = title_selectors;
    self.home_pages = home_pages;
    self.redirects.extend(redirects);
    self.pages.extend(pages);
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// List fields take comma-separated values. Bulk page lists are set with
  /// `pages.<type>=a,b` and redirects with `redirects.<from>=<to>`.
  ///
  /// # Errors
  ///
  /// Returns an error if an override is not `KEY=VALUE`, the key is unknown,
  /// or the value does not parse.
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  /// Set a single configuration key from its string form.
  ///
  /// # Errors
  ///
  /// Returns an error if the key is unknown or the value does not parse.
  pub fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    if let Some(content_type) = key.strip_prefix("pages.") {
      let content_type = parse_content_type(content_type)?;
      self.pages.insert(content_type.to_string(), split_list(value));
      return Ok(());
    }
    if let Some(from) = key.strip_prefix("redirects.") {
      self.redirects.insert(from.to_string(), value.to_string());
      return Ok(());
    }

    match key {
      "output_dir" => self.output_dir = PathBuf::from(value),
      "images_subdir" => self.images_subdir = value.to_string(),
      "max_filename_length" => {
        self.max_filename_length = parse_number(key, value)?;
      },
      "base_url" => self.base_url = value.to_string(),
      "wiki_path_prefix" => self.wiki_path_prefix = value.to_string(),
      "user_agent" => self.user_agent = value.to_string(),
      "request_timeout_secs" => {
        self.request_timeout_secs = parse_number(key, value)?;
      },
      "image_timeout_secs" => {
        self.image_timeout_secs = parse_number(key, value)?;
      },
      "image_delay_ms" => self.image_delay_ms = parse_number(key, value)?,
      "page_delay_ms" => self.page_delay_ms = parse_number(key, value)?,
      "unwanted_selectors" => self.unwanted_selectors = split_list(value),
      "sidebar_selectors" => self.sidebar_selectors = split_list(value),
      "main_content_selectors" => {
        self.main_content_selectors = split_list(value);
      },
      "title_selectors" => self.title_selectors = split_list(value),
      "home_pages" => self.home_pages = split_list(value),
      _ => {
        return Err(ConfigError::Config(format!(
          "Unknown configuration key: '{key}'. See documentation for \
           supported keys."
        )));
      },
    }

    Ok(())
  }

  /// Check the values that cannot be expressed in the types.
  ///
  /// # Errors
  ///
  /// Returns an error listing every problem found.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if self.max_filename_length < MIN_FILENAME_LENGTH {
      errors.push(format!(
        "max_filename_length must be at least {MIN_FILENAME_LENGTH}, got {}",
        self.max_filename_length
      ));
    }

    if self.wiki_host().is_none() {
      errors.push(format!(
        "base_url is not an absolute URL with a host: '{}'",
        self.base_url
      ));
    }

    if self.request_timeout_secs == 0 || self.image_timeout_secs == 0 {
      errors.push("Timeouts must be greater than zero".to_string());
    }

    if self.images_subdir.trim().is_empty() {
      errors.push("images_subdir must not be empty".to_string());
    }

    let selector_lists = [
      ("unwanted_selectors", &self.unwanted_selectors),
      ("sidebar_selectors", &self.sidebar_selectors),
      ("main_content_selectors", &self.main_content_selectors),
      ("title_selectors", &self.title_selectors),
    ];
    for (name, selectors) in selector_lists {
      for (index, selector) in selectors.iter().enumerate() {
        if selector.trim().is_empty() {
          errors.push(format!("{name} entry {} is empty", index + 1));
        }
      }
    }
    for (name, selectors) in &selector_lists[2..] {
      if selectors.is_empty() {
        errors.push(format!("{name} must not be empty"));
      }
    }

    for key in self.pages.keys() {
      if let Err(e) = parse_content_type(key) {
        errors.push(e.to_string());
      }
    }

    if !errors.is_empty() {
      let error_message = errors.join("\n");
      return Err(ConfigError::Config(format!(
        "Configuration validation errors:\n{error_message}"
      )));
    }

    Ok(())
  }

  /// Search for config files in common locations
  #[must_use]
  pub fn find_config_file() -> Option<PathBuf> {
    let current_dir = std::env::current_dir().ok()?;
    if let Some(found) = Self::find_config_file_in(&current_dir) {
      return Some(found);
    }

    let xdg_config_dir = std::env::var_os("XDG_CONFIG_HOME")
      .map(PathBuf::from)
      .or_else(|| {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
      })?;
    ["almanac/config.toml", "almanac/config.json"]
      .iter()
      .map(|name| xdg_config_dir.join(name))
      .find(|path| path.exists())
  }

  /// First of the standard config filenames present in `dir`.
  #[must_use]
  pub fn find_config_file_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
      .iter()
      .map(|name| dir.join(name))
      .find(|path| path.is_file())
  }

  /// Write a default configuration file in `format` (`toml` or `json`).
  ///
  /// # Errors
  ///
  /// Returns an error if the format is unsupported or the file cannot be
  /// written.
  pub fn generate_default_config(
    format: &str,
    path: &Path,
  ) -> Result<(), ConfigError> {
    let config_content = crate::templates::get_template(format)?;

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent)?;
    }
    fs::write(path, config_content).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to write default config to {}: {}",
        path.display(),
        e
      ))
    })?;

    log::info!("Created default configuration file: {}", path.display());
    Ok(())
  }

  /// Directory holding downloaded images.
  #[must_use]
  pub fn images_dir(&self) -> PathBuf {
    self.output_dir.join(&self.images_subdir)
  }

  /// Host name of `base_url`.
  #[must_use]
  pub fn wiki_host(&self) -> Option<String> {
    Url::parse(&self.base_url)
      .ok()
      .and_then(|url| url.host_str().map(str::to_string))
  }

  /// URL of the article `page`. Full URLs are returned unchanged.
  #[must_use]
  pub fn page_url(&self, page: &str) -> String {
    let page = page.trim();
    if page.starts_with("http://") || page.starts_with("https://") {
      return page.to_string();
    }

    let path = format!(
      "{}/{}",
      self.wiki_path_prefix.trim_end_matches('/'),
      page.trim_start_matches('/')
    );
    Url::parse(&self.base_url)
      .and_then(|base| base.join(&path))
      .map_or_else(
        |_| format!("{}{path}", self.base_url.trim_end_matches('/')),
        String::from,
      )
  }

  /// Resolved URLs configured for bulk scraping of `content_type`.
  #[must_use]
  pub fn pages_for(&self, content_type: ContentType) -> Vec<String> {
    self
      .pages
      .iter()
      .filter(|(key, _)| parse_content_type(key).ok() == Some(content_type))
      .flat_map(|(_, pages)| pages)
      .filter(|page| !page.trim().is_empty())
      .map(|page| self.page_url(page))
      .collect()
  }

  /// Link rewriter for this wiki.
  #[must_use]
  pub fn link_rewriter(&self) -> LinkRewriter {
    let host = self
      .wiki_host()
      .unwrap_or_else(|| LinkRewriter::default().wiki_host().to_string());
    let rewriter = self
      .home_pages
      .iter()
      .fold(LinkRewriter::new(host), |rewriter, page| {
        rewriter.with_home_page(page.as_str())
      });
    self
      .redirects
      .iter()
      .fold(rewriter, |rewriter, (from, to)| {
        rewriter.with_redirect(from.as_str(), to.as_str())
      })
  }

  /// Options of the document cleaner.
  #[must_use]
  pub fn clean_options(&self) -> CleanOptions {
    CleanOptions {
      unwanted_selectors: self.unwanted_selectors.clone(),
      sidebar_selectors:  self.sidebar_selectors.clone(),
      content_selectors:  self.main_content_selectors.clone(),
      links:              self.link_rewriter(),
    }
  }

  /// Options of the image cache.
  #[must_use]
  pub fn cache_options(&self) -> CacheOptions {
    CacheOptions {
      delay:               Duration::from_millis(self.image_delay_ms),
      max_filename_length: self.max_filename_length,
      reference_prefix:    format!("./{}", self.images_subdir.trim_matches('/')),
      base_url:            self.base_url.clone(),
    }
  }

  #[must_use]
  pub const fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  #[must_use]
  pub const fn image_timeout(&self) -> Duration {
    Duration::from_secs(self.image_timeout_secs)
  }

  #[must_use]
  pub const fn page_delay(&self) -> Duration {
    Duration::from_millis(self.page_delay_ms)
  }
}

/// Read a TOML or JSON file into a generic value, by extension.
fn read_value(path: &Path) -> Result<Value, ConfigError> {
  let content = fs::read_to_string(path).map_err(|e| {
    ConfigError::Config(format!(
      "Failed to read config file: {}: {}",
      path.display(),
      e
    ))
  })?;

  let extension = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(str::to_lowercase);
  match extension.as_deref() {
    Some("json") => {
      serde_json::from_str(&content).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to parse JSON config from {}: {}",
          path.display(),
          e
        ))
      })
    },
    Some("toml") => {
      toml::from_str(&content).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to parse TOML config from {}: {}",
          path.display(),
          e
        ))
      })
    },
    Some(_) => {
      Err(ConfigError::Config(format!(
        "Unsupported config file format: {}",
        path.display()
      )))
    },
    None => {
      Err(ConfigError::Config(format!(
        "Config file has no extension: {}",
        path.display()
      )))
    },
  }
}

/// Merge `overlay` into `base`: objects merge per key, anything else is
/// replaced.
fn merge_values(base: &mut Value, overlay: Value) {
  match (base, overlay) {
    (Value::Object(base), Value::Object(overlay)) => {
      for (key, value) in overlay {
        match base.get_mut(&key) {
          Some(existing) => merge_values(existing, value),
          None => {
            base.insert(key, value);
          },
        }
      }
    },
    (base, overlay) => *base = overlay,
  }
}

fn parse_number<T: std::str::FromStr>(
  key: &str,
  value: &str,
) -> Result<T, ConfigError> {
  value.parse().map_err(|_| {
    ConfigError::Config(format!(
      "Invalid value for '{key}': '{value}'. Expected a positive integer"
    ))
  })
}

fn parse_content_type(name: &str) -> Result<ContentType, ConfigError> {
  name.parse().map_err(|_| {
    ConfigError::Config(format!(
      "Unknown content type '{name}'. Expected plants or zombies"
    ))
  })
}

fn split_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
  #![allow(
    clippy::unwrap_used,
    clippy::field_reassign_with_default,
    reason = "Fine in tests"
  )]

  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.images_dir(), PathBuf::from("docs/images"));
    assert_eq!(config.wiki_host().as_deref(), Some("pvz.fandom.com"));
    assert_eq!(config.cache_options().reference_prefix, "./images");
  }

  #[test]
  fn test_config_merge_replaces_and_extends() {
    let mut base = Config::default();
    base.page_delay_ms = 10;

    let mut other = Config::default();
    other.page_delay_ms = 20;
    other.unwanted_selectors = vec![".only".to_string()];
    other.redirects.clear();
    other
      .redirects
      .insert("Old".to_string(), "New".to_string());

    base.merge(other);

    assert_eq!(base.page_delay_ms, 20);
    assert_eq!(base.unwanted_selectors, [".only"]);
    assert_eq!(base.redirects.len(), 2);
    assert_eq!(base.redirects["Old"], "New");
  }

  #[test]
  fn test_merge_values_is_key_by_key() {
    let mut base = serde_json::json!({
      "page_delay_ms": 100,
      "pages": { "plants": ["a"] },
      "home_pages": ["x", "y"],
    });
    merge_values(
      &mut base,
      serde_json::json!({
        "pages": { "zombies": ["b"] },
        "home_pages": ["z"],
      }),
    );

    assert_eq!(
      base,
      serde_json::json!({
        "page_delay_ms": 100,
        "pages": { "plants": ["a"], "zombies": ["b"] },
        "home_pages": ["z"],
      })
    );
  }

  #[test]
  fn test_apply_overrides() {
    let mut config = Config::default();

    config
      .apply_overrides(&[
        "output_dir=/tmp/out".to_string(),
        "page_delay_ms = 0".to_string(),
        "title_selectors=h1, .title".to_string(),
        "pages.zombie=普通僵尸,路障僵尸".to_string(),
        "redirects.A=B".to_string(),
      ])
      .unwrap();

    assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    assert_eq!(config.page_delay_ms, 0);
    assert_eq!(config.title_selectors, ["h1", ".title"]);
    assert_eq!(config.pages["zombies"], ["普通僵尸", "路障僵尸"]);
    assert_eq!(config.redirects["A"], "B");
  }

  #[test]
  fn test_apply_overrides_invalid_format() {
    let mut config = Config::default();

    let result = config.apply_overrides(&["no_equals_sign".to_string()]);

    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Expected KEY=VALUE")
    );
  }

  #[test]
  fn test_apply_overrides_unknown_key() {
    let mut config = Config::default();

    let result = config.apply_override("unknown_key", "value");

    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Unknown configuration key")
    );
  }

  #[test]
  fn test_apply_overrides_invalid_numeric() {
    let mut config = Config::default();

    let result = config.apply_override("max_filename_length", "lots");

    assert!(result.unwrap_err().to_string().contains("Invalid value"));
  }

  #[test]
  fn test_validate_reports_every_problem() {
    let mut config = Config::default();
    config.max_filename_length = 4;
    config.base_url = "not a url".to_string();
    config.sidebar_selectors.push("  ".to_string());
    config.pages.insert("mushrooms".to_string(), Vec::new());

    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("max_filename_length must be at least 16"));
    assert!(message.contains("base_url"));
    assert!(message.contains("sidebar_selectors entry 4 is empty"));
    assert!(message.contains("Unknown content type 'mushrooms'"));
  }

  #[test]
  fn test_page_url() {
    let config = Config::default();
    assert_eq!(
      config.page_url("豌豆射手"),
      "https://pvz.fandom.com/zh/wiki/%E8%B1%8C%E8%B1%86%E5%B0%84%E6%89%8B"
    );
    assert_eq!(
      config.page_url("https://example.org/wiki/X"),
      "https://example.org/wiki/X"
    );
  }

  #[test]
  fn test_pages_for_accepts_aliases() {
    let mut config = Config::default();
    config.pages.insert("plant".to_string(), vec!["向日葵".to_string()]);
    config.pages.insert("plants".to_string(), vec![
      "https://pvz.fandom.com/zh/wiki/A".to_string(),
      " ".to_string(),
    ]);

    let pages = config.pages_for(ContentType::Plants);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], "https://pvz.fandom.com/zh/wiki/A");
    assert!(pages[1].ends_with("/zh/wiki/%E5%90%91%E6%97%A5%E8%91%B5"));
    assert!(config.pages_for(ContentType::Zombies).is_empty());
  }

  #[test]
  fn test_link_rewriter_uses_configured_host() {
    let mut config = Config::default();
    config.base_url = "https://plantsvszombies.fandom.com".to_string();
    config.home_pages = vec!["Main_Page".to_string()];

    let rewriter = config.link_rewriter();
    assert_eq!(rewriter.wiki_host(), "plantsvszombies.fandom.com");
    assert_eq!(
      rewriter.target_for("Main_Page").as_deref(),
      Some("./index.html")
    );
  }
}
