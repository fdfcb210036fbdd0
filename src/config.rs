use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::paging::PagingConfig;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "CHARVAULT_API_URL";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub paging: PagingSettings,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
  /// Catalog root; the client appends `character` and `character/{id}`
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_base_url() -> String {
  "https://rickandmortyapi.com/api/".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PagingSettings {
  pub page_size: Option<u32>,
  /// Defaults to three pages
  pub initial_load_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
  /// SQLite file; defaults to the platform data directory
  pub path: Option<PathBuf>,
  /// Store characters fetched by id in the cache
  #[serde(default)]
  pub write_through: bool,
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./charvault.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/charvault/config.yaml
  ///
  /// Without a file the defaults apply. `CHARVAULT_API_URL` wins over the file.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides(std::env::var(API_URL_ENV).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("charvault.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("charvault").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  fn with_env_overrides(mut self, api_url: Option<String>) -> Self {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url;
    }
    self
  }

  pub fn paging_config(&self) -> PagingConfig {
    let base = match self.paging.page_size {
      Some(size) => PagingConfig::new(size),
      None => PagingConfig::default(),
    };
    match self.paging.initial_load_size {
      Some(initial) => base.with_initial_load_size(initial),
      None => base,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.api.base_url, "https://rickandmortyapi.com/api/");
    assert_eq!(config.api.timeout_secs, 30);
    assert!(!config.cache.write_through);
    assert_eq!(config.cache.path, None);

    let paging = config.paging_config();
    assert_eq!(paging.page_size, 20);
    assert_eq!(paging.initial_load_size, 60);
  }

  #[test]
  fn test_parse_partial_file() {
    let config = Config::parse(
      r#"
api:
  base_url: http://localhost:8080/api/
paging:
  page_size: 10
cache:
  path: /tmp/charvault.db
  write_through: true
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "http://localhost:8080/api/");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/charvault.db")));
    assert!(config.cache.write_through);

    let paging = config.paging_config();
    assert_eq!(paging.page_size, 10);
    assert_eq!(paging.initial_load_size, 30);
  }

  #[test]
  fn test_explicit_initial_load_size() {
    let config = Config::parse("paging:\n  page_size: 5\n  initial_load_size: 7\n").unwrap();
    assert_eq!(config.paging_config().initial_load_size, 7);
  }

  #[test]
  fn test_empty_file_is_default() {
    assert_eq!(Config::parse("\n").unwrap(), Config::default());
  }

  #[test]
  fn test_unknown_shape_is_rejected() {
    assert!(Config::parse("api: [1, 2]").is_err());
  }

  #[test]
  fn test_env_override() {
    let config = Config::default().with_env_overrides(Some("http://mirror.test/api/".into()));
    assert_eq!(config.api.base_url, "http://mirror.test/api/");

    let config = Config::default().with_env_overrides(Some("  ".into()));
    assert_eq!(config.api.base_url, "https://rickandmortyapi.com/api/");
  }

  #[test]
  fn test_missing_explicit_path_fails() {
    let result = Config::load(Some(Path::new("/nonexistent/charvault.yaml")));
    assert!(result.is_err());
  }
}
