//! Path resolution for saltpipe configuration.
//!
//! # Environment Variables
//!
//! - `SALTPIPE_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/saltpipe`)
//!
//! # Path Resolution Priority
//!
//! 1. `SALTPIPE_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/saltpipe` (if set)
//! 3. `~/.config/saltpipe`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SALTPIPE_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Get the saltpipe config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("saltpipe");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("saltpipe");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of `config.toml`
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
