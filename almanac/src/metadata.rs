//! Per-page metadata kept next to the generated pages.
use std::{
  fs,
  path::{Path, PathBuf},
};

use almanac_dom::dom;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{error::ScrapeError, output::now_utc};

/// Metadata file written into the output directory.
pub const METADATA_FILE: &str = "plant_metadata.json";

/// Image of the rendered infobox card.
const CARD_IMAGE_SELECTOR: &str = "img.infobox-image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
  pub name:         String,
  pub image:        Option<String>,
  pub last_updated: String,
}

impl PageMetadata {
  /// Metadata of a page titled `title` whose infobox card is
  /// `sidebar_html`. The image path is relative to the output directory.
  #[must_use]
  pub fn from_page(title: &str, sidebar_html: &str) -> Self {
    let image = (!sidebar_html.trim().is_empty())
      .then(|| dom::parse_fragment(sidebar_html))
      .and_then(|card| dom::select_first(&card, CARD_IMAGE_SELECTOR))
      .and_then(|img| dom::attr(&img, "src"))
      .filter(|src| !src.is_empty())
      .map(|src| src.strip_prefix("./").unwrap_or(&src).to_string());

    Self {
      name: title.to_string(),
      image,
      last_updated: now_utc(),
    }
  }
}

/// Title -> metadata map persisted as JSON.
#[derive(Debug)]
pub struct MetadataStore {
  path:    PathBuf,
  entries: IndexMap<String, PageMetadata>,
}

impl MetadataStore {
  /// Load the store of `output_dir`. A missing file gives an empty store;
  /// an unreadable one is logged and replaced on the next save.
  #[must_use]
  pub fn load(output_dir: &Path) -> Self {
    let path = output_dir.join(METADATA_FILE);
    let entries = if path.exists() {
      fs::read_to_string(&path)
        .map_err(ScrapeError::from)
        .and_then(|content| Ok(serde_json::from_str(&content)?))
        .unwrap_or_else(|e| {
          warn!("Could not load page metadata, starting fresh: {e}");
          IndexMap::new()
        })
    } else {
      IndexMap::new()
    };

    Self { path, entries }
  }

  /// Record `metadata` under `title` and save the whole store.
  pub fn record(&mut self, title: &str, metadata: PageMetadata) {
    self.entries.insert(title.to_string(), metadata);
    if let Err(e) = self.save() {
      warn!("Could not save page metadata: {e}");
    }
  }

  /// Write the store to disk.
  ///
  /// # Errors
  ///
  /// Returns an error if serialization or the write fails.
  pub fn save(&self) -> Result<(), ScrapeError> {
    let json = serde_json::to_string_pretty(&self.entries)?;
    fs::write(&self.path, json)?;
    Ok(())
  }

  #[must_use]
  pub fn get(&self, title: &str) -> Option<&PageMetadata> {
    self.entries.get(title)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
