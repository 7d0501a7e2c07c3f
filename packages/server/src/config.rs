//! Server configuration
//!
//! Read from the environment (after `.env` is loaded by the binary). Interval
//! overrides saved from the admin page live in a small JSON file next to the
//! database so they survive restarts.

use knowledgetree_sync::SyncIntervals;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DATABASE_PATH: &str = "./data/knowledgetree.db";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_SETTINGS_PATH: &str = "./data/settings.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Settings file {}: {message}", .path.display())]
    SettingsFile { path: PathBuf, message: String },
}

impl ConfigError {
    fn settings_file(path: &Path, message: impl Into<String>) -> Self {
        Self::SettingsFile {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Which tree store backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// libsql database file at `database_path`
    #[default]
    Turso,
    /// Process memory; everything is lost on exit
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub settings_path: PathBuf,
    pub store: StoreKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            store: StoreKind::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("KT_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "KT_PORT",
                value: raw,
            })?,
            None => defaults.port,
        };

        let store = match get("KT_STORE").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("turso") => StoreKind::Turso,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "KT_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            port,
            database_path: get("KT_DATABASE_PATH").map(PathBuf::from).unwrap_or(defaults.database_path),
            upload_dir: get("KT_UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            settings_path: get("KT_SETTINGS_PATH").map(PathBuf::from).unwrap_or(defaults.settings_path),
            store,
        })
    }
}

/// Load saved interval overrides; `None` if nothing was saved yet
pub async fn load_intervals(path: &Path) -> Result<Option<SyncIntervals>, ConfigError> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::settings_file(path, format!("failed to read: {}", e)))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::settings_file(path, format!("failed to parse: {}", e)))
}

/// Save interval overrides (write to a temp file, then rename over the old one)
pub async fn save_intervals(path: &Path, intervals: &SyncIntervals) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ConfigError::settings_file(path, format!("failed to create directory: {}", e)))?;
    }

    let serialized = serde_json::to_string_pretty(intervals)
        .map_err(|e| ConfigError::settings_file(path, format!("failed to serialize: {}", e)))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, serialized)
        .await
        .map_err(|e| ConfigError::settings_file(path, format!("failed to write: {}", e)))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| ConfigError::settings_file(path, format!("failed to replace: {}", e)))?;
    Ok(())
}
