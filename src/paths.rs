//! Common paths for tootkit data storage
//!
//! Everything lives under ~/.config/tootkit/ on all platforms:
//! - config.toml - Client configuration
//! - app.json - Registered application credentials
//! - user.json - User access token

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Get the tootkit data directory (~/.config/tootkit/)
///
/// This is consistent across all platforms for simplicity.
pub fn tootkit_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
    let dir = home.join(".config").join("tootkit");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the config file path (~/.config/tootkit/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(tootkit_dir()?.join("config.toml"))
}

/// Get the application credentials path (~/.config/tootkit/app.json)
pub fn app_credentials_path() -> Result<PathBuf> {
    Ok(tootkit_dir()?.join("app.json"))
}

/// Get the user credentials path (~/.config/tootkit/user.json)
pub fn user_credentials_path() -> Result<PathBuf> {
    Ok(tootkit_dir()?.join("user.json"))
}
