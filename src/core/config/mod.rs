//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first match wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$LINECOOK_CONFIG` if set
//! 3. `.github/linecook.yml` in the repository
//! 4. `.linecook.yml` in the repository
//!
//! If none exists, defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use linecook::core::config::Config;
//! use std::path::Path;
//!
//! let loaded = Config::load(None, Path::new("/path/to/repo")).unwrap();
//! println!("base branch: {}", loaded.config.base_branch);
//! ```

pub mod schema;

pub use schema::{Config, UpstreamEntry};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LINECOOK_CONFIG";

/// Repository-relative locations searched for a config file.
pub const REPO_CONFIG_CANDIDATES: [&str; 2] = [".github/linecook.yml", ".linecook.yml"];

/// Errors from configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("remote '{remote}' points at '{actual}', expected '{expected}'")]
    RemoteUrlMismatch {
        remote: String,
        expected: String,
        actual: String,
    },
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// The file it came from, if any.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated. An explicit path that does not exist is a read error.
    pub fn load(explicit: Option<&Path>, repo_root: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(repo_root),
        };

        let config = match &path {
            Some(path) => Self::read(path)?,
            None => Config::default(),
        };
        config.validate()?;

        Ok(ConfigLoadResult { config, path })
    }

    fn discover(repo_root: &Path) -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }
        REPO_CONFIG_CANDIDATES
            .iter()
            .map(|rel| repo_root.join(rel))
            .find(|p| p.exists())
    }

    /// Read and parse a config file.
    fn read(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents).map_err(|message| ConfigError::ParseError {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse YAML text. An empty document yields the defaults.
    pub fn parse(contents: &str) -> Result<Config, String> {
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    }
}
