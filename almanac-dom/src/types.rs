use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::CleanError;

/// Kind of page being normalized.
///
/// Only used to pick the display header of the infobox card and the class
/// names of the rendered sidebar.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
  #[default]
  Plants,
  Zombies,
}

impl ContentType {
  /// Header label shown on top of the infobox card.
  #[must_use]
  pub const fn header_label(self) -> &'static str {
    match self {
      Self::Plants => "植物图鉴",
      Self::Zombies => "僵尸图鉴",
    }
  }

  /// Class prefix of the rendered infobox card, e.g. `plant-infobox`.
  #[must_use]
  pub const fn card_prefix(self) -> &'static str {
    match self {
      Self::Plants => "plant",
      Self::Zombies => "zombie",
    }
  }

  /// Name used in configuration and on the command line.
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Plants => "plants",
      Self::Zombies => "zombies",
    }
  }
}

impl fmt::Display for ContentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ContentType {
  type Err = CleanError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "plant" | "plants" => Ok(Self::Plants),
      "zombie" | "zombies" => Ok(Self::Zombies),
      other => Err(CleanError::UnknownContentType(other.to_string())),
    }
  }
}

/// Result of cleaning one page: the normalized article body and the
/// rendered infobox card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedContent {
  pub main_html: String,

  /// Empty when the page had no infobox.
  pub sidebar_html: String,
}
