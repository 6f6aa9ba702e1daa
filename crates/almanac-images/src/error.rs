use thiserror::Error;

/// Failure to fetch one remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("Request to {url} failed: {source}")]
  Transport {
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("Request to {url} returned status {status}")]
  Status { url: String, status: u16 },

  #[error("Unsupported URL: {0}")]
  UnsupportedUrl(String),

  #[error("Failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
}

/// Errors of the image cache itself.
#[derive(Debug, Error)]
pub enum ImageError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Failed to move downloaded image into place: {0}")]
  Persist(#[from] tempfile::PersistError),

  #[error(transparent)]
  Fetch(#[from] FetchError),
}
