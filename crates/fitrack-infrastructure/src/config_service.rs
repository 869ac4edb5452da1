//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the root configuration
//! from the configuration file (~/.config/fitrack/config.toml by default).

use crate::paths::FitrackPaths;
use fitrack_core::config::RootConfig;
use fitrack_core::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configuration service that loads and caches the root configuration.
///
/// A missing or empty file yields the default configuration. A file that
/// cannot be parsed is reported once in the log and also falls back to the
/// defaults, so a broken config never prevents a training session.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<RootConfig>>>,
}

impl ConfigService {
    /// Creates a ConfigService reading `path`. Nothing is read until the
    /// first call to [`get_config`](Self::get_config).
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a ConfigService for the platform default config file.
    pub fn from_default_location() -> Result<Self> {
        Ok(Self::new(FitrackPaths::config_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the root configuration, loading from file if not cached.
    pub fn get_config(&self) -> RootConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = match Self::load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "[ConfigService] Using default config, failed to load {:?}: {}",
                    self.path,
                    e
                );
                RootConfig::default()
            }
        };

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());
        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Reads and parses `path` without touching the cache.
    pub fn load_config(path: &Path) -> Result<RootConfig> {
        if !path.exists() {
            tracing::debug!("[ConfigService] No config at {:?}, using defaults", path);
            return Ok(RootConfig::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(RootConfig::default());
        }

        Ok(toml::from_str(&content)?)
    }
}
