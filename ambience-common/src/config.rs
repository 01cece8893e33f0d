//! Configuration file discovery and asset folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "AMBIENCE_CONFIG";

/// Configuration file resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Per-user config file (`~/.config/ambience/config.toml`)
/// 4. System config file (`/etc/ambience/config.toml`, Linux only)
///
/// Returns `Ok(None)` when no file exists anywhere, meaning built-in defaults
/// apply. An explicitly named file that does not exist is an error.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    // Priority 3/4: Platform locations
    Ok(platform_config_candidates().into_iter().find(|p| p.exists()))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Candidate configuration file locations for the platform
fn platform_config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("ambience").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/ambience/config.toml"));
    }
    candidates
}

/// Read a TOML file into any deserializable configuration type
pub fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))
}

/// OS-dependent default folder holding sound assets
pub fn default_asset_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ambience").join("sounds"))
        .unwrap_or_else(|| PathBuf::from("./static/sounds"))
}
