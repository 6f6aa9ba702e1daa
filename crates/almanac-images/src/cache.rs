//! The content-addressed image cache.
use std::{
  fs::{self, File},
  io::{self, Read, Write},
  path::{Path, PathBuf},
  thread,
  time::Duration,
};

use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{
  error::ImageError,
  filename::{derive_filename, unique_path},
  source::{HttpSource, ImageSource},
  store::{StringMap, read_map, write_map},
};

/// File in the images directory holding the URL to filename map.
pub const URL_MAPPING_FILE: &str = ".url_mapping.json";

/// File in the images directory holding the content hash to filename map.
pub const CONTENT_HASH_FILE: &str = ".content_hashes.json";

/// Read size used when hashing downloaded files.
const HASH_CHUNK_SIZE: usize = 4096;

/// Tunables of an [`ImageCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
  /// Politeness delay before each download.
  pub delay:               Duration,
  /// Longest filename kept before shortening.
  pub max_filename_length: usize,
  /// Prefix of rewritten references, relative to the page files.
  pub reference_prefix:    String,
  /// Site root used for root-relative sources without a page URL.
  pub base_url:            String,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      delay:               Duration::from_millis(500),
      max_filename_length: 100,
      reference_prefix:    "./images".to_string(),
      base_url:            "https://pvz.fandom.com".to_string(),
    }
  }
}

/// Summary of what the cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
  pub total_downloaded:     usize,
  pub cache_directory:      PathBuf,
  pub downloaded_filenames: Vec<String>,
}

/// Maps remote image URLs to local files, storing identical content once.
///
/// Both maps are loaded by [`ImageCache::load`] and written back after
/// every new download, or explicitly with [`ImageCache::flush`].
#[derive(Debug)]
pub struct ImageCache<S = HttpSource> {
  source:     S,
  images_dir: PathBuf,
  options:    CacheOptions,
  urls:       StringMap,
  hashes:     StringMap,
}

impl<S: ImageSource> ImageCache<S> {
  /// Open the cache rooted at `images_dir`, creating the directory.
  ///
  /// URL entries whose file no longer exists are dropped. Corrupt map
  /// files are ignored with a warning.
  ///
  /// # Errors
  ///
  /// Returns an error if the directory cannot be created.
  pub fn load(
    images_dir: impl Into<PathBuf>,
    source: S,
    options: CacheOptions,
  ) -> Result<Self, ImageError> {
    let images_dir = images_dir.into();
    fs::create_dir_all(&images_dir)?;

    let mut urls = read_map(&images_dir.join(URL_MAPPING_FILE));
    let recorded = urls.len();
    urls.retain(|_, filename| images_dir.join(filename.as_str()).exists());
    if urls.len() < recorded {
      debug!(
        "Dropped {} image mappings with missing files",
        recorded - urls.len()
      );
    }

    let hashes = read_map(&images_dir.join(CONTENT_HASH_FILE));
    info!(
      "Loaded {} image mappings and {} content hashes",
      urls.len(),
      hashes.len()
    );

    Ok(Self {
      source,
      images_dir,
      options,
      urls,
      hashes,
    })
  }

  /// Directory holding the cached files.
  #[must_use]
  pub fn images_dir(&self) -> &Path {
    &self.images_dir
  }

  #[must_use]
  pub const fn options(&self) -> &CacheOptions {
    &self.options
  }

  /// Reference to a cached file as written into pages.
  #[must_use]
  pub fn local_reference(&self, path: &Path) -> String {
    let name = path
      .file_name()
      .map(|name| name.to_string_lossy())
      .unwrap_or_default();
    format!("{}/{name}", self.options.reference_prefix.trim_end_matches('/'))
  }

  /// Resolve `url` to a local file, downloading it when needed.
  ///
  /// Returns `None` if the download fails; the failure is logged and never
  /// leaves a partial file behind.
  pub fn resolve(&mut self, url: &str) -> Option<PathBuf> {
    if let Some(path) = self.cached(url) {
      debug!("Using cached image {url} -> {}", path.display());
      return Some(path);
    }

    match self.download(url) {
      Ok(path) => Some(path),
      Err(e) => {
        warn!("Failed to download image {url}: {e}");
        None
      },
    }
  }

  /// Path of `url` if it is mapped and the file still exists. Stale
  /// entries are forgotten.
  fn cached(&mut self, url: &str) -> Option<PathBuf> {
    let path = self.images_dir.join(self.urls.get(url)?);
    if path.exists() {
      return Some(path);
    }
    self.urls.shift_remove(url);
    None
  }

  fn download(&mut self, url: &str) -> Result<PathBuf, ImageError> {
    if !self.options.delay.is_zero() {
      thread::sleep(self.options.delay);
    }

    debug!("Downloading image {url}");
    let fetched = self.source.fetch(url)?;

    let mut temp = NamedTempFile::new_in(&self.images_dir)?;
    temp.write_all(&fetched.bytes)?;
    temp.flush()?;

    let content_hash = match hash_file(temp.path()) {
      Ok(hash) => Some(hash),
      Err(e) => {
        warn!("Could not hash download of {url}, skipping dedup: {e}");
        None
      },
    };

    if let Some(existing) = content_hash
      .as_deref()
      .and_then(|hash| self.existing_file(hash))
    {
      debug!("Duplicate content for {url}, reusing {existing}");
      self.urls.insert(url.to_string(), existing.clone());
      self.save();
      return Ok(self.images_dir.join(existing));
    }

    let filename = derive_filename(
      url,
      fetched.content_type.as_deref(),
      self.options.max_filename_length,
    );
    let path = unique_path(&self.images_dir, &filename);
    temp.persist_noclobber(&path)?;

    let stored = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or(filename);
    self.urls.insert(url.to_string(), stored.clone());
    if let Some(hash) = content_hash {
      self.hashes.insert(hash, stored);
    }
    self.save();

    Ok(path)
  }

  /// Filename already holding content with `hash`, if that file exists.
  fn existing_file(&self, hash: &str) -> Option<String> {
    self
      .hashes
      .get(hash)
      .filter(|filename| self.images_dir.join(filename.as_str()).exists())
      .cloned()
  }

  fn save(&self) {
    if let Err(e) = self.flush() {
      warn!("Could not save image cache maps: {e}");
    }
  }

  /// Write both maps to the images directory.
  ///
  /// # Errors
  ///
  /// Returns an error if either map cannot be written.
  pub fn flush(&self) -> Result<(), ImageError> {
    write_map(&self.images_dir.join(URL_MAPPING_FILE), &self.urls)?;
    write_map(&self.images_dir.join(CONTENT_HASH_FILE), &self.hashes)
  }

  /// Number of mapped URLs and the filenames they point at.
  #[must_use]
  pub fn stats(&self) -> DownloadStats {
    DownloadStats {
      total_downloaded:     self.urls.len(),
      cache_directory:      self.images_dir.clone(),
      downloaded_filenames: self.urls.values().cloned().collect(),
    }
  }

  /// Filename recorded for `hash`, if any.
  #[must_use]
  pub fn filename_for_hash(&self, hash: &str) -> Option<&str> {
    self.hashes.get(hash).map(String::as_str)
  }

  /// Number of distinct stored contents.
  #[must_use]
  pub fn content_count(&self) -> usize {
    self.hashes.len()
  }
}

/// SHA-256 of a file, read in fixed-size chunks.
fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; HASH_CHUNK_SIZE];
  loop {
    let read = file.read(&mut buffer)?;
    if read == 0 {
      break;
    }
    hasher.update(&buffer[..read]);
  }
  Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;
  use crate::{error::FetchError, filename::sha256_hex, source::FetchedImage};

  struct Offline;

  impl ImageSource for Offline {
    fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
      Err(FetchError::UnsupportedUrl(url.to_string()))
    }
  }

  #[test]
  fn test_hash_file_matches_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob");
    let bytes: Vec<u8> =
      (0..10_000u32).map(|i| u8::try_from(i % 251).unwrap()).collect();
    fs::write(&path, &bytes).unwrap();

    assert_eq!(hash_file(&path).unwrap(), sha256_hex(&bytes));
  }

  #[test]
  fn test_failed_fetch_and_local_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = ImageCache::load(
      dir.path(),
      Offline,
      CacheOptions {
        reference_prefix: "./images/".to_string(),
        ..CacheOptions::default()
      },
    )
    .unwrap();

    assert!(cache.resolve("https://img.example.net/a.png").is_none());
    assert_eq!(
      cache.local_reference(Path::new("/tmp/x/Peashooter.png")),
      "./images/Peashooter.png"
    );
  }
}
