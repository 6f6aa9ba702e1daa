//! JSON persistence for the cache maps.
use std::{fs, path::Path};

use indexmap::IndexMap;
use log::warn;

use crate::error::ImageError;

/// A persisted `key -> value` map, kept in insertion order.
pub type StringMap = IndexMap<String, String>;

/// Read a map from `path`.
///
/// A missing file yields an empty map. An unreadable or malformed file is
/// logged and also yields an empty map.
#[must_use]
pub fn read_map(path: &Path) -> StringMap {
  if !path.exists() {
    return StringMap::new();
  }

  let parsed = fs::read_to_string(path)
    .map_err(ImageError::from)
    .and_then(|content| Ok(serde_json::from_str(&content)?));

  match parsed {
    Ok(map) => map,
    Err(e) => {
      warn!("Ignoring unreadable cache map {}: {e}", path.display());
      StringMap::new()
    },
  }
}

/// Write `map` to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_map(path: &Path, map: &StringMap) -> Result<(), ImageError> {
  let json = serde_json::to_string_pretty(map)?;
  fs::write(path, json)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Tests can unwrap")]
  use super::*;

  #[test]
  fn test_missing_and_corrupt_maps_are_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.json");
    assert!(read_map(&path).is_empty());

    fs::write(&path, "{ not json").unwrap();
    assert!(read_map(&path).is_empty());
  }

  #[test]
  fn test_map_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("map.json");

    let mut map = StringMap::new();
    map.insert("b".to_string(), "2".to_string());
    map.insert("a".to_string(), "1".to_string());
    write_map(&path, &map).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("\n  \"b\": \"2\""));

    let keys: Vec<_> = read_map(&path).into_keys().collect();
    assert_eq!(keys, ["b", "a"]);
  }
}
