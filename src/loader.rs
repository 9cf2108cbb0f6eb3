//! Config file discovery and loading.
//!
//! Handles finding the config file across different platforms and loading it.
//! The search order is:
//!
//! 1. `$XDG_CONFIG_HOME/sshfan/config.toml`
//! 2. `~/.config/sshfan/config.toml`
//! 3. Platform default (e.g., `~/Library/Application Support` on macOS)
//!
//! The config file is optional: when none exists, built-in defaults apply.

use crate::config::Config;
use crate::error::{Result, SshfanError};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "sshfan";
const CONFIG_FILE: &str = "config.toml";

/// Find an existing config file.
///
/// Checks locations in order of preference:
/// 1. `$XDG_CONFIG_HOME/sshfan/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/sshfan/config.toml` (common on Linux, often used on macOS)
/// 3. Platform default via `dirs::config_dir()`
///
/// Returns `Ok(None)` when none of them exists.
///
/// # Errors
///
/// Returns [`SshfanError::NoConfigDir`] if no candidate location can be
/// determined at all.
pub fn default_config_path() -> Result<Option<PathBuf>> {
    let candidates = candidate_paths();
    if candidates.is_empty() {
        return Err(SshfanError::NoConfigDir);
    }
    Ok(candidates.into_iter().find(|path| path.exists()))
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join(APP_DIR).join(CONFIG_FILE));
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR).join(CONFIG_FILE));
    }

    candidates
}

/// Load and parse a config file from the given path.
///
/// # Errors
///
/// - [`SshfanError::ConfigNotFound`] if the file doesn't exist
/// - [`SshfanError::IoError`] if reading fails
/// - [`SshfanError::ConfigError`] if TOML parsing fails
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(SshfanError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config = Config::from_str(&contents)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Load the explicitly requested config, or the default one if it exists.
///
/// An explicit path must exist. A missing default config yields
/// [`Config::default`].
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => match default_config_path()? {
            Some(path) => load_config(&path),
            None => Ok(Config::default()),
        },
    }
}
