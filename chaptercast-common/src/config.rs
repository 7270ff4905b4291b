//! Configuration file discovery and loading
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CHAPTERCAST_CONFIG` environment variable
//! 3. User config file (`~/.config/chaptercast/config.toml` on Linux)
//! 4. System config file (`/etc/chaptercast/config.toml`, Linux only)
//! 5. Built-in defaults (no file)
//!
//! A missing configuration file is never fatal: the loader logs a warning and
//! falls back to `Default`.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CHAPTERCAST_CONFIG";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "chaptercast";

/// Logging section shared by every chaptercast binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Validate the configured level name
    pub fn validate(&self) -> Result<()> {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(Error::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Resolves which configuration file (if any) to load
pub struct ConfigResolver {
    app_name: String,
}

impl ConfigResolver {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
        }
    }

    /// Resolve the config file path following the priority order
    ///
    /// An explicit path (CLI or env var) is returned even if it does not
    /// exist, so the loader can warn about it. Platform default locations are
    /// only returned when the file exists.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            debug!(app = %self.app_name, path = %path.display(), "Config path from command line");
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!(app = %self.app_name, path = %path, "Config path from {}", CONFIG_ENV_VAR);
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3/4: Platform default locations
        default_config_paths().into_iter().find(|p| p.exists())
    }
}

/// Candidate default config file locations for the current platform
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR_NAME).join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml"));
    }

    paths
}

/// Load a TOML config file, falling back to defaults when it is missing
///
/// Parse errors are reported as `Error::Config`; a file that does not exist
/// yields `T::default()` with a warning.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
