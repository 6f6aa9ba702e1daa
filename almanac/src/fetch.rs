//! Fetching wiki pages.
use std::time::Duration;

use almanac_config::Config;
use almanac_images::{FetchError, HttpSource};
use log::{debug, info};
use reqwest::blocking::Client;

/// A source of wiki page markup.
pub trait PageSource {
  /// Fetch `url` and return its body as text.
  ///
  /// # Errors
  ///
  /// Returns an error on transport failures, timeouts and non-success
  /// statuses.
  fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

impl<T: PageSource + ?Sized> PageSource for &T {
  fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
    (**self).fetch_page(url)
  }
}

/// Blocking HTTP page fetcher.
#[derive(Debug, Clone)]
pub struct HttpPages {
  client:  Client,
  timeout: Duration,
}

impl HttpPages {
  #[must_use]
  pub const fn new(client: Client, timeout: Duration) -> Self {
    Self { client, timeout }
  }
}

impl PageSource for HttpPages {
  fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
    info!("Fetching: {url}");
    let transport = |source| {
      FetchError::Transport {
        url: url.to_string(),
        source,
      }
    };

    let response = self
      .client
      .get(url)
      .timeout(self.timeout)
      .send()
      .map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url:    url.to_string(),
        status: status.as_u16(),
      });
    }

    let bytes = response.bytes().map_err(transport)?;
    debug!("Fetched {} bytes from {url}", bytes.len());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }
}

/// Page and image fetchers sharing one client with the configured user
/// agent. Images use the client timeout, pages their own.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn http_sources(config: &Config) -> Result<(HttpPages, HttpSource), FetchError> {
  let client = Client::builder()
    .user_agent(config.user_agent.as_str())
    .timeout(config.image_timeout())
    .build()
    .map_err(FetchError::Client)?;

  Ok((
    HttpPages::new(client.clone(), config.request_timeout()),
    HttpSource::from_client(client),
  ))
}
