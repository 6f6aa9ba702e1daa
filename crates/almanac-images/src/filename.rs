//! Local filenames for downloaded images.
use std::{
  path::{Path, PathBuf},
  sync::LazyLock,
};

use log::error;
use percent_encoding::percent_decode_str;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::utils::never_matching_regex;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"[<>:"/\\|?*]"#).unwrap_or_else(|e| {
    error!("Failed to compile UNSAFE_CHARS regex in filename.rs: {e}");
    never_matching_regex()
  })
});

static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"[_\s]+").unwrap_or_else(|e| {
    error!("Failed to compile SEPARATOR_RUNS regex in filename.rs: {e}");
    never_matching_regex()
  })
});

/// Extension used when neither the URL nor the content type gives one.
const DEFAULT_EXTENSION: &str = ".jpg";

/// Length kept for the suffix when a long filename is shortened.
const SUFFIX_ALLOWANCE: usize = 20;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// Extension for an image content type, defaulting to `.jpg`.
#[must_use]
pub fn extension_from_content_type(content_type: Option<&str>) -> &'static str {
  let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
  if content_type.contains("png") {
    ".png"
  } else if content_type.contains("gif") {
    ".gif"
  } else if content_type.contains("webp") {
    ".webp"
  } else {
    DEFAULT_EXTENSION
  }
}

/// Derive a sanitized filename for an image URL.
///
/// Uses the decoded last path segment. When it is missing or has no
/// extension, falls back to `image_<hash8><ext>` with the extension taken
/// from the content type.
#[must_use]
pub fn derive_filename(
  url: &str,
  content_type: Option<&str>,
  max_length: usize,
) -> String {
  let path = Url::parse(url).map_or_else(
    |_| url.split(['?', '#']).next().unwrap_or_default().to_string(),
    |parsed| parsed.path().to_string(),
  );
  let decoded = percent_decode_str(&path).decode_utf8_lossy().into_owned();
  let basename = decoded.rsplit('/').next().unwrap_or_default();

  let filename = if basename.is_empty() || !basename.contains('.') {
    let hash = sha256_hex(url.as_bytes());
    format!(
      "image_{}{}",
      &hash[..8],
      extension_from_content_type(content_type)
    )
  } else {
    basename.to_string()
  };

  let filename = sanitize_filename(&filename, max_length);
  if Path::new(&filename).extension().is_none() {
    format!("{filename}{DEFAULT_EXTENSION}")
  } else {
    filename
  }
}

/// Replace filesystem-unsafe characters, collapse separator runs and cap
/// the length, keeping the extension.
#[must_use]
pub fn sanitize_filename(filename: &str, max_length: usize) -> String {
  let safe = UNSAFE_CHARS.replace_all(filename, "_");
  let safe = SEPARATOR_RUNS.replace_all(&safe, "_").into_owned();

  if safe.chars().count() <= max_length {
    return safe;
  }

  let (stem, suffix) = split_extension(&safe);
  let keep = max_length.saturating_sub(SUFFIX_ALLOWANCE).max(1);
  let stem: String = stem.chars().take(keep).collect();
  format!("{stem}{suffix}")
}

/// Split `name` into stem and suffix (with its dot). Leading dots do not
/// start a suffix.
fn split_extension(name: &str) -> (&str, &str) {
  match name.rfind('.') {
    Some(index) if index > 0 => name.split_at(index),
    _ => (name, ""),
  }
}

/// First path in `dir` for `filename` that does not exist yet, appending
/// `_1`, `_2` ... to the stem on collisions.
#[must_use]
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
  let candidate = dir.join(filename);
  if !candidate.exists() {
    return candidate;
  }

  let (stem, suffix) = split_extension(filename);
  (1..)
    .map(|counter| dir.join(format!("{stem}_{counter}{suffix}")))
    .find(|path| !path.exists())
    .unwrap_or(candidate)
}
