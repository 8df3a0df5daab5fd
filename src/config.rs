//! Configuration management for StreamHub
//!
//! Handles settings file loading/saving and the debrid API credential.
//! Settings are stored at ~/.config/streamhub/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::api::search::FieldLayout;

/// Environment variable that overrides the persisted token
pub const TOKEN_ENV_VAR: &str = "RD_API_TOKEN";

/// Default Real-Debrid REST base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Default torrent search endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://valradiant.xyz/rarbg.php";

/// Errors from reading or writing the settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Torrent search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub field_layout: FieldLayout,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            field_layout: FieldLayout::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Real-Debrid API token
    pub rd_api_token: Option<String>,
    /// Debrid API base URL override
    pub api_base_url: Option<String>,
    /// Torrent search provider
    pub search: SearchConfig,
    /// Local player (mpv, vlc)
    pub player: Option<String>,
    /// Seconds between torrent status polls
    pub poll_interval_secs: Option<u64>,
    /// Maximum torrent status polls before giving up
    pub poll_max_attempts: Option<u32>,
}

impl Config {
    /// Get config file path (~/.config/streamhub/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamhub").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load config from a specific file. A missing file yields the default.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Save config to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml).map_err(io_err)
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.unwrap_or(2))
    }

    pub fn poll_max_attempts(&self) -> u32 {
        self.poll_max_attempts.unwrap_or(30)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Where a credential is persisted
#[derive(Debug, Clone)]
enum Backing {
    /// Not persisted anywhere (tests, one-off tokens)
    Memory,
    /// Persisted under `rd_api_token` in a settings file
    File(PathBuf),
}

/// The debrid API token, shared by every client built from it.
///
/// Nothing is read implicitly: call [`Credentials::reload`] to pull the
/// persisted value. Writes go through [`Credentials::set`] and
/// [`Credentials::clear`], which also persist.
#[derive(Debug, Clone)]
pub struct Credentials {
    backing: Backing,
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    /// In-memory credential holding a fixed token
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            backing: Backing::Memory,
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// In-memory credential with no token
    pub fn empty() -> Self {
        Self {
            backing: Backing::Memory,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Credential backed by a settings file; starts empty until `reload`
    pub fn persisted(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(path.into()),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Re-read the token from the environment or the settings file.
    ///
    /// `RD_API_TOKEN` wins over the persisted value.
    pub fn reload(&self) -> Result<Option<String>, ConfigError> {
        let token = match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => match &self.backing {
                Backing::Memory => self.token(),
                Backing::File(path) => Config::load_from(path)?.rd_api_token,
            },
        };
        self.store(token.clone());
        Ok(token)
    }

    /// Current token, if any
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn is_configured(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }

    /// Replace the token and persist it
    pub fn set(&self, token: impl Into<String>) -> Result<(), ConfigError> {
        let token = token.into().trim().to_string();
        self.persist(Some(token.clone()))?;
        self.store(Some(token));
        Ok(())
    }

    /// Remove the token and persist the removal
    pub fn clear(&self) -> Result<(), ConfigError> {
        self.persist(None)?;
        self.store(None);
        Ok(())
    }

    fn store(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn persist(&self, token: Option<String>) -> Result<(), ConfigError> {
        if let Backing::File(path) = &self.backing {
            let mut config = Config::load_from(path)?;
            config.rd_api_token = token;
            config.save_to(path)?;
        }
        Ok(())
    }
}
