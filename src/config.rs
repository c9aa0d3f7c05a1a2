use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::RecoveryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub shop: ShopConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub forms: FormsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopConfig {
  /// Shop root url; the REST API is expected under `wp-json/wc/v3/`
  pub url: String,
  /// WooCommerce REST consumer key (ck_...)
  pub consumer_key: String,
  /// Per-request timeout for API calls
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Product snapshot directory (defaults to $XDG_DATA_HOME/stockpile/products)
  pub dir: Option<PathBuf>,
  /// What to do with unreadable snapshot entries: clear_all or quarantine
  #[serde(default)]
  pub recovery: RecoveryPolicy,
}

/// Optional overrides for the bundled form layouts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormsConfig {
  pub product: Option<PathBuf>,
  pub stock_in: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stockpile.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stockpile/config.yaml
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
        "No configuration file found. Create one at ~/.config/stockpile/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("stockpile.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("stockpile").join("config.yaml");
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

  /// Directory holding the product snapshot.
  pub fn cache_dir(&self) -> Result<PathBuf> {
    match &self.cache.dir {
      Some(dir) => Ok(dir.clone()),
      None => Ok(Self::data_dir()?.join("products")),
    }
  }

  /// Directory for log files.
  pub fn log_dir(&self) -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("logs"))
  }

  fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("stockpile"))
  }

  /// Get the WooCommerce consumer secret from environment variables.
  ///
  /// Checks STOCKPILE_CONSUMER_SECRET first, then WOO_CONSUMER_SECRET as fallback.
  pub fn get_consumer_secret() -> Result<String> {
    std::env::var("STOCKPILE_CONSUMER_SECRET")
      .or_else(|_| std::env::var("WOO_CONSUMER_SECRET"))
      .map_err(|_| {
        eyre!(
          "WooCommerce consumer secret not found. Set STOCKPILE_CONSUMER_SECRET or WOO_CONSUMER_SECRET environment variable."
        )
      })
  }
}
