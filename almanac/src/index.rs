//! The generated `index.html`.
use std::{
  fs,
  path::{Path, PathBuf},
};

use log::info;
use walkdir::WalkDir;

use crate::{
  error::ScrapeError,
  output::{Renderer, ensure_stylesheet, now_utc},
};

/// Stem of the index page itself.
const INDEX_STEM: &str = "index";

/// Stems with this prefix are scratch output and never listed.
const TEST_PAGE_PREFIX: &str = "test_";

/// Sorted stems of the pages directly inside `output_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_pages(output_dir: &Path) -> Result<Vec<String>, ScrapeError> {
  let mut pages = Vec::new();
  for entry in WalkDir::new(output_dir).min_depth(1).max_depth(1) {
    let entry = entry.map_err(std::io::Error::from)?;
    let path = entry.path();
    if !entry.file_type().is_file()
      || path.extension().and_then(|ext| ext.to_str()) != Some("html")
    {
      continue;
    }

    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
      continue;
    };
    if stem == INDEX_STEM || stem.starts_with(TEST_PAGE_PREFIX) {
      continue;
    }
    pages.push(stem.to_string());
  }

  pages.sort();
  Ok(pages)
}

/// Render `index.html` for the pages in `output_dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or the index cannot
/// be rendered or written.
pub fn generate_index(
  output_dir: &Path,
  renderer: &Renderer,
) -> Result<PathBuf, ScrapeError> {
  fs::create_dir_all(output_dir)?;
  let pages = list_pages(output_dir)?;
  let html = renderer.render_index(&pages, &now_utc())?;

  let path = output_dir.join(format!("{INDEX_STEM}.html"));
  fs::write(&path, html)?;
  ensure_stylesheet(output_dir)?;

  info!("Generated index.html with {} pages", pages.len());
  Ok(path)
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_list_pages_filters_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    for name in [
      "豌豆射手.html",
      "向日葵.html",
      "index.html",
      "test_page.html",
      "notes.txt",
    ] {
      fs::write(dir.path().join(name), "").unwrap();
    }
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested/坚果墙.html"), "").unwrap();

    let mut expected = vec!["向日葵".to_string(), "豌豆射手".to_string()];
    expected.sort();
    assert_eq!(list_pages(dir.path()).unwrap(), expected);
  }

  #[test]
  fn test_generate_index_writes_page_and_stylesheet() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("向日葵.html"), "").unwrap();

    let path = generate_index(dir.path(), &Renderer::new().unwrap()).unwrap();
    let html = fs::read_to_string(path).unwrap();
    assert!(html.contains("./向日葵.html"));
    assert!(dir.path().join("styles/style.css").exists());
  }
}
