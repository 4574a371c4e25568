mod schema;
mod validation;

pub use schema::{Config, RetryConfig};
pub use validation::validate_config;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/ghi/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("ghi"))
}

/// Get the default config file path (~/.config/ghi/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load configuration from a YAML file.
///
/// With `path` set the file must exist. Without it the default location is
/// tried and a missing file yields the default configuration.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            read_config(&path)
        }
        None => {
            let path = get_config_path()?;
            if !path.exists() {
                tracing::debug!("no config file at {}; using defaults", path.display());
                return Ok(Config::default());
            }
            read_config(&path)
        }
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_saphyr::from_str(content)?)
}
