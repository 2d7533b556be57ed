pub mod schema;

pub use schema::{DispatchMode, MediatorConfig, NumericPreference, RegistryKind};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default toolgate home directory (~/.toolgate).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".toolgate"))
        .unwrap_or_else(|| PathBuf::from(".toolgate"))
}

/// Default config file location inside the home directory.
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("toolgate.toml")
}

/// Expand a path that may start with `~`.
pub fn resolve_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<MediatorConfig> {
    let config = if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read toolgate config file")?;
        toml::from_str(&contents).context("Failed to parse toolgate config (TOML)")?
    } else {
        MediatorConfig::default()
    };
    config.validate().context("Invalid toolgate config")?;
    Ok(config)
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &MediatorConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}
