//! Configuration management for bam

mod bam;
pub mod serde_utils;

pub use bam::{BamConfig, ShareConfig, DEFAULT_TLD};

use crate::error::ConfigError;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default configuration directory (`~/.bam`)
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bam")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load and validate a configuration file
pub fn load_config(path: &Path) -> Result<BamConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let config: BamConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Write a configuration file, replacing any previous one in a single rename
pub fn save_config(path: &Path, config: &BamConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let content = toml::to_string_pretty(config)?;

    let io_error = |what: &str, e: io::Error| ConfigError::Invalid(format!("Failed to {}: {}", what, e));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create config dir", e))?;
    }

    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, content).map_err(|e| io_error("write config", e))?;
    std::fs::rename(&staging, path).map_err(|e| io_error("replace config", e))?;

    Ok(())
}
