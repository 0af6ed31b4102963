use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

pub const DATABASE_URL_ENV: &str = "BLUELIGHT_DATABASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DataSettings,
}

/// Connection settings handed to `DataManager::initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Pre-built connection URL; takes precedence over `path`.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bluelight-store");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_pool_size() -> u32 {
    8
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            url: None,
            path: default_db_path(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DataSettings {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            url: None,
            path: path.into(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }

    /// Resolve the database file from `url` (`sqlite://<path>`, `file:<path>`
    /// or a bare path) or fall back to `path`.
    pub fn database_path(&self) -> Result<PathBuf> {
        let Some(url) = self.url.as_deref() else {
            return Ok(PathBuf::from(&self.path));
        };

        let target = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);

        if target.is_empty() || target.contains(":memory:") {
            return Err(StoreError::Config(format!(
                "connection url {url} does not name a database file"
            )));
        }
        if target.contains("://") {
            return Err(StoreError::Config(format!(
                "no connection driver for url {url}"
            )));
        }
        Ok(PathBuf::from(target))
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.database.url = Some(url);
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bluelight-store")
            .join("config.toml")
    }
}
