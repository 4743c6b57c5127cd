//! Application configuration: where playlists, tools, and the media cache
//! live on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, FileSystemError, Result};

const fn default_true() -> bool {
    true
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory where playlists are stored.
    pub playlists_directory: PathBuf,
    /// Directory searched for bundled external tools.
    #[serde(default = "default_tools_directory")]
    pub tools_directory: PathBuf,
    /// Media cache directory override. `None` resolves the default
    /// working-directory cache.
    #[serde(default)]
    pub cache_directory: Option<PathBuf>,
    /// Whether tool lookup may fall back to probing `PATH`.
    #[serde(default = "default_true")]
    pub probe_path: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playlists_directory: default_playlists_directory(),
            tools_directory: default_tools_directory(),
            cache_directory: None,
            probe_path: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, or create defaults if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory or file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
    }
}

/// Default playlists directory under the platform's data dir.
#[must_use]
pub fn default_playlists_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunevault")
        .join("playlists")
}

fn default_tools_directory() -> PathBuf {
    PathBuf::from("tools")
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunevault")
        .join("config.json")
}
