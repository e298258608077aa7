use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use pack_track_core::{OauthApp, SyncOptions};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the document, credentials, and history files
    pub data_dir: PathBuf,
    /// OAuth client id for the Google Drive backend
    pub google_client_id: String,
    /// OAuth client secret for the Google Drive backend
    pub google_client_secret: String,
    /// Debounce delay before a local edit triggers a push, in milliseconds
    pub debounce_ms: u64,
    /// Safety-net sync interval, in milliseconds
    pub periodic_ms: u64,
    /// Number of version snapshots to keep
    pub history_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("packtrack");
        Self {
            data_dir,
            google_client_id: String::new(),
            google_client_secret: String::new(),
            debounce_ms: 5000,
            periodic_ms: 120_000,
            history_cap: 10,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(data_dir) = std::env::var("PACKTRACK_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(client_id) = std::env::var("PACKTRACK_GOOGLE_CLIENT_ID") {
            config.google_client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("PACKTRACK_GOOGLE_CLIENT_SECRET") {
            config.google_client_secret = client_secret;
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/packtrack/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("packtrack")
            .join("config.yaml")
    }

    /// Scheduling options for the sync coordinator.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            periodic: Duration::from_millis(self.periodic_ms),
            history_cap: self.history_cap,
        }
    }

    /// OAuth application credentials for the cloud backend.
    pub fn oauth(&self) -> OauthApp {
        OauthApp {
            client_id: self.google_client_id.clone(),
            client_secret: self.google_client_secret.clone(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::tempdir;

    // `Config::load` reads process-wide environment variables, so tests
    // touching it must not run concurrently with the env-override test.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.data_dir.to_string_lossy().contains("packtrack"));
        assert_eq!(config.debounce_ms, 5000);
        assert_eq!(config.periodic_ms, 120_000);
        assert_eq!(config.history_cap, 10);
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let _env = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.history_cap, 10);
    }

    #[test]
    fn test_load_from_file() {
        let _env = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/packtrack").unwrap();
        writeln!(file, "debounce_ms: 250").unwrap();
        writeln!(file, "google_client_id: my-client").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/packtrack"));
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.google_client_id, "my-client");
    }

    #[test]
    fn test_env_var_overrides_file() {
        let _env = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "google_client_id: fromfile").unwrap();

        std::env::set_var("PACKTRACK_GOOGLE_CLIENT_ID", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.google_client_id, "fromenv");

        std::env::remove_var("PACKTRACK_GOOGLE_CLIENT_ID");
    }

    #[test]
    fn test_sync_options_conversion() {
        let mut config = Config::default();
        config.debounce_ms = 1000;
        config.periodic_ms = 30_000;
        config.history_cap = 3;

        let options = config.sync_options();
        assert_eq!(options.debounce, Duration::from_secs(1));
        assert_eq!(options.periodic, Duration::from_secs(30));
        assert_eq!(options.history_cap, 3);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let _env = env_guard();
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }
}
