use std::path::PathBuf;

use almanac_dom::ContentType;
use clap::{Parser, Subcommand};

/// Command line interface for almanac
#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Almanac: offline copies of plant and zombie wiki pages"
)]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Commands,

  /// Enable verbose debug logging
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times) Multiple files are merged in order, with later files overriding
  /// earlier ones
  #[arg(
    short = 'c',
    long = "config-file",
    global = true,
    action = clap::ArgAction::Append
  )]
  pub config_files: Vec<PathBuf>,

  /// Override configuration values (KEY=VALUE format, can be used multiple
  /// times)
  #[arg(long = "config", global = true, action = clap::ArgAction::Append)]
  pub config_overrides: Vec<String>,
}

/// All supported subcommands for the almanac CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Initialize a new almanac configuration file
  Init {
    /// Path to create the configuration file at
    #[arg(short, long, default_value = "almanac.toml")]
    output: PathBuf,

    /// Format of the configuration file.
    #[arg(short = 'F', long, default_value = "toml", value_parser = ["toml", "json"])]
    format: String,

    /// Force overwrite if file already exists
    #[arg(short, long)]
    force: bool,
  },

  /// Scrape a single wiki page.
  Page {
    /// URL of the page, or a page name on the configured wiki.
    url: String,

    /// Output filename inside the output directory. Defaults to a name
    /// derived from the page title, or from the URL with --type.
    output: Option<String>,

    /// Content type of the page (plants or zombies).
    #[arg(short = 't', long = "type")]
    content_type: Option<ContentType>,
  },

  /// Scrape every configured page of a content type.
  Bulk {
    /// Content type to scrape (plants or zombies).
    #[arg(short = 't', long = "type", default_value = "plants")]
    content_type: ContentType,

    /// Skip pages whose output file already exists.
    #[arg(long)]
    resume: bool,

    /// Seconds to wait between pages. Defaults to the configured delay.
    #[arg(long)]
    delay: Option<f64>,
  },

  /// Regenerate index.html from the pages in the output directory.
  Index,

  /// Show what the image cache holds.
  Stats,
}

impl Cli {
  /// Parse command line arguments into a [`Cli`] struct.
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }
}
