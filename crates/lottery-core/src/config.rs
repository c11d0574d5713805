//! Application configuration management.
//!
//! Configuration is stored at `<config dir>/lottery/config.json`. The API
//! endpoint and data directory can be overridden from the environment
//! (`LOTTERY_API_URL`, `LOTTERY_DATA_DIR`), which is how `.env` files take
//! effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ClientConfig, DEFAULT_API_PREFIX, DEFAULT_TIMEOUT_SECS};
use crate::storage::{FileBackend, KeyValueBackend, KeyringBackend, MemoryBackend, Storage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "lottery";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// File holding the persistent storage tier when the file backend is used
const PERSISTENT_STORE_FILE: &str = "local-storage.json";

const DEFAULT_API_URL: &str = "http://localhost:8080";

pub const ENV_API_URL: &str = "LOTTERY_API_URL";
pub const ENV_DATA_DIR: &str = "LOTTERY_DATA_DIR";

/// Where the refresh token survives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistentBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub api_prefix: String,
    pub request_timeout_secs: u64,
    pub persistent_backend: PersistentBackend,
    pub data_dir: Option<PathBuf>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            persistent_backend: PersistentBackend::default(),
            data_dir: None,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir.trim()));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone())
            .with_prefix(self.api_prefix.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    /// Session tier in memory, persistent tier as configured.
    pub fn open_storage(&self) -> Result<Storage> {
        let persistent: Arc<dyn KeyValueBackend> = match self.persistent_backend {
            PersistentBackend::File => {
                Arc::new(FileBackend::new(self.data_dir()?.join(PERSISTENT_STORE_FILE)))
            }
            PersistentBackend::Keyring => Arc::new(KeyringBackend::new()),
        };
        Ok(Storage::new(Arc::new(MemoryBackend::new()), persistent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageTier;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_prefix, "/v1/api");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.persistent_backend, PersistentBackend::File);

        let client = config.client_config();
        assert_eq!(client.timeout, Duration::from_secs(30));
        assert_eq!(client.url("/auth"), "http://localhost:8080/v1/api/auth");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url": "https://lottery.example.com", "persistent_backend": "keyring"}"#)
            .expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.api_url, "https://lottery.example.com");
        assert_eq!(config.persistent_backend, PersistentBackend::Keyring);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let config = Config { last_username: Some("lan".into()), request_timeout_secs: 5, ..Config::default() };
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.last_username.as_deref(), Some("lan"));
        assert_eq!(loaded.request_timeout_secs, 5);
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = Config::load_from(&dir.path().join("nope.json")).expect("defaults");
        assert_eq!(missing.api_url, DEFAULT_API_URL);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").expect("write");
        assert!(Config::load_from(&bad).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_API_URL, " https://staging.example.com "), (ENV_DATA_DIR, "/tmp/lottery-data")]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://staging.example.com");
        assert_eq!(config.data_dir().expect("data dir"), PathBuf::from("/tmp/lottery-data"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config { data_dir: Some(dir.path().to_path_buf()), ..Config::default() };

        let storage = config.open_storage().expect("open");
        storage.save("auth-local", &json!({"state": {"refreshToken": "sealed"}}), StorageTier::Persistent).expect("save");
        storage.save("auth-session", &json!("sealed"), StorageTier::Session).expect("save");

        let reopened = config.open_storage().expect("reopen");
        assert_eq!(
            reopened.load("auth-local", StorageTier::Persistent),
            Some(json!({"state": {"refreshToken": "sealed"}}))
        );
        assert_eq!(reopened.load("auth-session", StorageTier::Session), None);
        assert!(dir.path().join(PERSISTENT_STORE_FILE).exists());
    }
}
