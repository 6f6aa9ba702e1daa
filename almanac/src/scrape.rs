//! Scraping single pages and page lists.
use std::{fs, path::PathBuf, thread, time::Duration};

use almanac_config::Config;
use almanac_dom::{
  CleanError,
  Cleaner,
  ContentType,
  dom,
  page_filename_from_url,
};
use almanac_images::{DownloadStats, ImageCache, ImageSource};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use crate::{
  error::ScrapeError,
  fetch::PageSource,
  metadata::{MetadataStore, PageMetadata},
  output::{Renderer, ensure_stylesheet, extract_title, output_filename},
};

/// Outcome of a bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
  pub total:     usize,
  pub succeeded: usize,
  pub skipped:   usize,
  pub failed:    Vec<String>,
}

impl BulkSummary {
  /// Whether every attempted page was written.
  #[must_use]
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }
}

/// One written page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
  pub title: String,
  pub path:  PathBuf,
}

/// Scrapes wiki pages into the output directory.
pub struct Scraper<P, S> {
  config:   Config,
  cleaner:  Cleaner,
  pages:    P,
  images:   ImageCache<S>,
  renderer: Renderer,
  metadata: MetadataStore,
}

impl<P: PageSource, S: ImageSource> Scraper<P, S> {
  /// Set up the output directory, image cache and metadata store.
  ///
  /// # Errors
  ///
  /// Returns an error if the output directory cannot be created or the
  /// templates do not parse.
  pub fn new(config: Config, pages: P, images: S) -> Result<Self, ScrapeError> {
    fs::create_dir_all(&config.output_dir)?;
    let images =
      ImageCache::load(config.images_dir(), images, config.cache_options())?;
    let metadata = MetadataStore::load(&config.output_dir);

    Ok(Self {
      cleaner: Cleaner::new(config.clean_options()),
      renderer: Renderer::new()?,
      config,
      pages,
      images,
      metadata,
    })
  }

  #[must_use]
  pub const fn config(&self) -> &Config {
    &self.config
  }

  #[must_use]
  pub const fn metadata(&self) -> &MetadataStore {
    &self.metadata
  }

  #[must_use]
  pub fn image_stats(&self) -> DownloadStats {
    self.images.stats()
  }

  /// Scrape one page and write it to the output directory.
  ///
  /// Without an explicit `output` name, pages scraped for a content type are
  /// named after their URL and others after their title.
  ///
  /// # Errors
  ///
  /// Returns an error if the page cannot be fetched, has no content, or
  /// cannot be written.
  pub fn scrape_page(
    &mut self,
    url: &str,
    output: Option<&str>,
    content_type: Option<ContentType>,
  ) -> Result<ScrapedPage, ScrapeError> {
    let html = self.pages.fetch_page(url)?;
    let clean_error = |source: CleanError| {
      ScrapeError::Clean {
        url: url.to_string(),
        source,
      }
    };

    let document = dom::parse_document(&html);
    let title = extract_title(&document, &self.config.title_selectors);
    let root = self.cleaner.find_content_root(&document).ok_or_else(|| {
      clean_error(CleanError::MissingContentRoot(
        self.config.main_content_selectors.join(", "),
      ))
    })?;

    let report = self
      .cleaner
      .clean_document(&root, content_type.unwrap_or_default())
      .map_err(clean_error)?;

    self.images.localize_document(&root, url);
    let main_html = dom::serialize(&root);
    let sidebar_html =
      self.images.process_images_in_html(&report.sidebar_html, url);

    let stats = self.images.stats();
    if stats.total_downloaded > 0 {
      info!(
        "{} images cached in {}",
        stats.total_downloaded,
        stats.cache_directory.display()
      );
    }

    let filename = output_filename(
      url,
      &title,
      output,
      content_type,
      self.config.max_filename_length,
    );
    let path = self.config.output_dir.join(&filename);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let page = self.renderer.render_page(&title, &main_html, &sidebar_html)?;
    fs::write(&path, page)?;
    ensure_stylesheet(&self.config.output_dir)?;
    info!("Saved: {}", path.display());

    self
      .metadata
      .record(&title, PageMetadata::from_page(&title, &sidebar_html));

    Ok(ScrapedPage { title, path })
  }

  /// Scrape every configured page of `content_type`, one after another.
  ///
  /// A failing page is reported and skipped. With `resume`, pages whose
  /// output file exists are not fetched again. `delay` separates page
  /// fetches and defaults to the configured page delay.
  pub fn scrape_bulk(
    &mut self,
    content_type: ContentType,
    resume: bool,
    delay: Option<Duration>,
  ) -> BulkSummary {
    let urls = self.config.pages_for(content_type);
    let delay = delay.unwrap_or_else(|| self.config.page_delay());
    let mut summary = BulkSummary {
      total: urls.len(),
      ..BulkSummary::default()
    };

    if urls.is_empty() {
      warn!("No pages configured for content type: {content_type}");
      return summary;
    }

    info!(
      "Starting bulk download: {} {content_type} pages into {}",
      urls.len(),
      self.config.output_dir.display()
    );

    let progress = ProgressBar::new(urls.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
      .template("[{elapsed_precise}] {bar:40.green/white} {pos}/{len} {msg}")
    {
      progress.set_style(style.progress_chars("=> "));
    }

    let last = urls.len() - 1;
    for (index, url) in urls.iter().enumerate() {
      let expected = self.config.output_dir.join(page_filename_from_url(url));
      progress.set_message(page_filename_from_url(url));

      if resume && expected.exists() {
        info!("Skipping existing page: {}", expected.display());
        summary.skipped += 1;
        progress.inc(1);
        continue;
      }

      match self.scrape_page(url, None, Some(content_type)) {
        Ok(page) => {
          summary.succeeded += 1;
          info!("Completed: {}", page.path.display());
        },
        Err(e) => {
          error!("Failed to scrape {url}: {e}");
          summary.failed.push(url.clone());
        },
      }
      progress.inc(1);

      if index < last && !delay.is_zero() {
        thread::sleep(delay);
      }
    }
    progress.finish_and_clear();

    info!(
      "Bulk download complete: {} succeeded, {} skipped, {} failed",
      summary.succeeded,
      summary.skipped,
      summary.failed.len()
    );
    summary
  }
}
