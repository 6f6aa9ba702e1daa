use std::{fs, process::ExitCode, time::Duration};

use almanac::{
  cli::{Cli, Commands},
  fetch::{HttpPages, http_sources},
  index::generate_index,
  output::Renderer,
  scrape::Scraper,
};
use almanac_config::Config;
use almanac_images::{HttpSource, ImageCache};
use color_eyre::eyre::{Context, Result, bail};
use log::{LevelFilter, info, warn};

fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let cli = Cli::parse_args();

  // Initialize logging first so we can log during command handling
  env_logger::Builder::new()
    .filter_level(if cli.verbose {
      LevelFilter::Debug
    } else {
      LevelFilter::Info
    })
    .write_style(env_logger::WriteStyle::Always)
    .init();

  if let Commands::Init {
    output,
    format,
    force,
  } = &cli.command
  {
    if output.exists() && !force {
      bail!(
        "Configuration file already exists: {}. Use --force to overwrite.",
        output.display()
      );
    }

    Config::generate_default_config(format, output).wrap_err_with(|| {
      format!("Failed to generate configuration file: {}", output.display())
    })?;
    info!(
      "Configuration file created successfully. Add page URLs under [pages] \
       to use bulk mode."
    );
    return Ok(ExitCode::SUCCESS);
  }

  let config = Config::load(&cli.config_files, &cli.config_overrides)
    .wrap_err("Failed to load configuration")?;

  match cli.command {
    Commands::Init { .. } => Ok(ExitCode::SUCCESS),

    Commands::Page {
      url,
      output,
      content_type,
    } => {
      let url = config.page_url(&url);
      let mut scraper = build_scraper(config)?;
      let page = scraper
        .scrape_page(&url, output.as_deref(), content_type)
        .wrap_err_with(|| format!("Failed to scrape {url}"))?;
      info!("Scraping completed successfully: {}", page.path.display());
      Ok(ExitCode::SUCCESS)
    },

    Commands::Bulk {
      content_type,
      resume,
      delay,
    } => {
      let delay = delay
        .map(Duration::try_from_secs_f64)
        .transpose()
        .wrap_err("Invalid --delay")?;
      let mut scraper = build_scraper(config)?;
      let summary = scraper.scrape_bulk(content_type, resume, delay);

      info!("Successful: {}", summary.succeeded);
      if summary.skipped > 0 {
        info!("Skipped: {}", summary.skipped);
      }
      for url in &summary.failed {
        warn!("Failed: {url}");
      }
      info!(
        "Files saved to: {}",
        scraper.config().output_dir.display()
      );

      if summary.total == 0 {
        bail!("No pages configured for content type: {content_type}");
      }
      Ok(if summary.is_success() {
        ExitCode::SUCCESS
      } else {
        ExitCode::FAILURE
      })
    },

    Commands::Index => {
      let path = generate_index(&config.output_dir, &Renderer::new()?)
        .wrap_err("Failed to generate index")?;
      info!("Index written to {}", path.display());
      Ok(ExitCode::SUCCESS)
    },

    Commands::Stats => {
      let (_, images) = http_sources(&config)?;
      let cache =
        ImageCache::load(config.images_dir(), images, config.cache_options())
          .wrap_err("Failed to open image cache")?;
      let stats = cache.stats();

      info!("Images directory: {}", stats.cache_directory.display());
      info!("Cached image URLs: {}", stats.total_downloaded);
      let mut files = stats.downloaded_filenames;
      files.sort();
      files.dedup();
      for file in &files {
        info!("  {file}");
      }
      Ok(ExitCode::SUCCESS)
    },
  }
}

fn build_scraper(config: Config) -> Result<Scraper<HttpPages, HttpSource>> {
  fs::create_dir_all(&config.output_dir).wrap_err_with(|| {
    format!(
      "Failed to create output directory: {}",
      config.output_dir.display()
    )
  })?;
  let (pages, images) = http_sources(&config)?;
  Scraper::new(config, pages, images).wrap_err("Failed to set up scraper")
}
