//! Unified path management for fitrack files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/fitrack/           # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/fitrack/      # Data directory
//! └── store.json               # Local document store
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "fitrack";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform config directory could not be determined.
    ConfigDirNotFound,
    /// Platform data directory could not be determined.
    DataDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
            PathError::DataDirNotFound => write!(f, "Cannot find data directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for fitrack_core::FitrackError {
    fn from(err: PathError) -> Self {
        fitrack_core::FitrackError::config(err.to_string())
    }
}

/// Unified path management for fitrack.
pub struct FitrackPaths;

impl FitrackPaths {
    /// Returns the fitrack configuration directory (e.g. `~/.config/fitrack/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the fitrack data directory (e.g. `~/.local/share/fitrack/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DataDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the local document store file.
    pub fn store_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("store.json"))
    }
}
