use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::SqliteQueue;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub assets: AssetsConfig,
  #[serde(default)]
  pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Base URL of the exam server
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database path override (default: platform data dir)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
  /// Name of the asset cache
  #[serde(default = "default_cache_name")]
  pub cache_name: String,
  /// Paths prefetched at install time; all must succeed
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
}

impl Default for AssetsConfig {
  fn default() -> Self {
    Self {
      cache_name: default_cache_name(),
      manifest: default_manifest(),
    }
  }
}

fn default_cache_name() -> String {
  "mcq-cache".to_string()
}

/// The exam page's fixed asset list.
fn default_manifest() -> Vec<String> {
  [
    "/",
    "/static/css/styles-cta.css",
    "/static/offline.js",
    "/templates/exams-obj.html",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
  /// Seconds between connectivity probes in watch mode
  #[serde(default = "default_probe_interval")]
  pub probe_interval_secs: u64,
}

impl Default for WatchConfig {
  fn default() -> Self {
    Self {
      probe_interval_secs: default_probe_interval(),
    }
  }
}

fn default_probe_interval() -> u64 {
  5
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mcqsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mcqsync/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/mcqsync/config.yaml\n\
                 with at least a server url."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mcqsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mcqsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Where the offline database lives.
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.storage.path {
      Some(p) => Ok(p.clone()),
      None => SqliteQueue::default_path(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config: Config = serde_yaml::from_str(
      "server:\n  url: http://exam.example.com\n",
    )
    .unwrap();

    assert_eq!(config.server.url, "http://exam.example.com");
    assert_eq!(config.assets.cache_name, "mcq-cache");
    assert_eq!(config.assets.manifest.len(), 4);
    assert!(config.assets.manifest.contains(&"/static/offline.js".to_string()));
    assert_eq!(config.watch.probe_interval_secs, 5);
    assert!(config.storage.path.is_none());
  }

  #[test]
  fn test_overrides_are_honored() {
    let config: Config = serde_yaml::from_str(
      "server:\n  url: http://exam.example.com\n\
       storage:\n  path: /tmp/exam.db\n\
       assets:\n  cache_name: alt\n  manifest: [\"/only\"]\n\
       watch:\n  probe_interval_secs: 30\n",
    )
    .unwrap();

    assert_eq!(config.storage.path.as_deref(), Some(Path::new("/tmp/exam.db")));
    assert_eq!(config.assets.cache_name, "alt");
    assert_eq!(config.assets.manifest, vec!["/only"]);
    assert_eq!(config.watch.probe_interval_secs, 30);
  }
}
