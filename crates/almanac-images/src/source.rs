//! Where image bytes come from.
use std::time::Duration;

use log::debug;
use reqwest::{blocking::Client, header::CONTENT_TYPE};

use crate::error::FetchError;

/// Bytes of one fetched image with the declared content type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedImage {
  pub bytes:        Vec<u8>,
  pub content_type: Option<String>,
}

/// A source of remote images.
pub trait ImageSource {
  /// Fetch `url`.
  ///
  /// # Errors
  ///
  /// Returns an error on transport failures, timeouts and non-success
  /// statuses.
  fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

impl<T: ImageSource + ?Sized> ImageSource for &T {
  fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
    (**self).fetch(url)
  }
}

/// Fetches images over HTTP with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpSource {
  client: Client,
}

impl HttpSource {
  /// Build a source with its own client.
  ///
  /// # Errors
  ///
  /// Returns an error if the HTTP client cannot be built.
  pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
    let client = Client::builder()
      .user_agent(user_agent)
      .timeout(timeout)
      .build()
      .map_err(FetchError::Client)?;
    Ok(Self { client })
  }

  /// Use an existing client, e.g. the one that fetches pages.
  #[must_use]
  pub const fn from_client(client: Client) -> Self {
    Self { client }
  }
}

impl ImageSource for HttpSource {
  fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
    debug!("GET {url}");
    let transport = |source| {
      FetchError::Transport {
        url: url.to_string(),
        source,
      }
    };

    let response = self.client.get(url).send().map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url:    url.to_string(),
        status: status.as_u16(),
      });
    }

    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string);
    let bytes = response.bytes().map_err(transport)?.to_vec();

    Ok(FetchedImage {
      bytes,
      content_type,
    })
  }
}
