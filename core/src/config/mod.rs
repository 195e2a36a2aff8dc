//! Configuration management
//!
//! The shell reads one value that matters, `backend_url`, and hands it to the
//! chat session explicitly. Nothing in the library reads configuration from
//! globals.

pub mod store;

pub use store::{Config, UiConfig, BACKEND_URL_ENV};

use std::path::PathBuf;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "devpane.toml";

/// Find the configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(LOCAL_CONFIG_FILE);
        if path.exists() {
            return Some(path);
        }
    }

    Config::default_path().filter(|path| path.exists())
}

/// Get the configuration directory path
pub fn get_config_dir() -> Option<PathBuf> {
    use dirs::config_dir;
    use home::home_dir;

    if let Some(dir) = config_dir() {
        return Some(dir.join("devpane"));
    }

    if let Some(home) = home_dir() {
        return Some(home.join(".config").join("devpane"));
    }

    None
}
