#![allow(clippy::expect_used, reason = "Fine in tests")]
use std::{fs, path::PathBuf};

use almanac_config::Config;
use almanac_dom::ContentType;
use tempfile::tempdir;

#[test]
fn merges_toml_and_json_files_key_by_key() {
  let dir = tempdir().expect("tempdir");
  let base = dir.path().join("almanac.toml");
  fs::write(
    &base,
    r#"
output_dir = "site"
page_delay_ms = 0

[pages]
plants = ["豌豆射手", "https://pvz.fandom.com/zh/wiki/Sunflower"]
"#,
  )
  .expect("write toml");

  let local = dir.path().join("local.json");
  fs::write(
    &local,
    r#"{ "images_subdir": "img", "pages": { "zombies": ["普通僵尸"] } }"#,
  )
  .expect("write json");

  let config = Config::load(&[base, local], &["image_delay_ms=0".to_string()])
    .expect("load config");

  assert_eq!(config.output_dir, PathBuf::from("site"));
  assert_eq!(config.images_dir(), PathBuf::from("site/img"));
  assert_eq!(config.page_delay_ms, 0);
  assert_eq!(config.image_delay_ms, 0);
  assert_eq!(config.max_filename_length, 100);
  assert_eq!(config.pages_for(ContentType::Plants).len(), 2);
  assert_eq!(config.pages_for(ContentType::Zombies).len(), 1);
}

#[test]
fn rejects_invalid_files() {
  let dir = tempdir().expect("tempdir");

  let yaml = dir.path().join("almanac.yaml");
  fs::write(&yaml, "output_dir: x").expect("write");
  let err = Config::load(&[yaml], &[]).expect_err("yaml is unsupported");
  assert!(err.to_string().contains("Unsupported config file format"));

  let broken = dir.path().join("broken.toml");
  fs::write(&broken, "output_dir = ").expect("write");
  let err = Config::load(&[broken], &[]).expect_err("broken toml");
  assert!(err.to_string().contains("Failed to parse TOML config"));

  let short = dir.path().join("short.json");
  fs::write(&short, r#"{ "max_filename_length": 8 }"#).expect("write");
  let err = Config::load(&[short], &[]).expect_err("too short");
  assert!(err.to_string().contains("max_filename_length"));
}

#[test]
fn generated_default_config_loads_back() {
  let dir = tempdir().expect("tempdir");

  for format in ["toml", "json"] {
    let path = dir.path().join(format!("nested/almanac.{format}"));
    Config::generate_default_config(format, &path).expect("generate");
    let loaded = Config::from_file(&path).expect("load generated");
    assert_eq!(loaded, Config::default());
  }

  assert_eq!(
    Config::find_config_file_in(&dir.path().join("nested")),
    Some(dir.path().join("nested/almanac.toml"))
  );
  assert!(Config::find_config_file_in(dir.path()).is_none());
}
