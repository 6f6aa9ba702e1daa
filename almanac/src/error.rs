use std::io;

use almanac_dom::CleanError;
use almanac_images::{FetchError, ImageError};
use thiserror::Error;

/// Failure to produce one output page.
#[derive(Debug, Error)]
pub enum ScrapeError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("Failed to clean {url}: {source}")]
  Clean {
    url:    String,
    #[source]
    source: CleanError,
  },

  #[error("Template error: {0}")]
  Template(#[from] tera::Error),

  #[error("Image cache error: {0}")]
  Image(#[from] ImageError),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Serde error: {0}")]
  Serde(#[from] serde_json::Error),
}
