//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/anotar/config.toml)
//! 3. Environment variables (ANOTAR_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "ANOTAR";

/// Seconds between periodic flushes
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local state (session token)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the task API (without the `/tasks` suffix)
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Seconds between periodic flushes
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Hosted sign-in domain
    #[serde(default)]
    pub auth_domain: Option<String>,

    /// OAuth client id for the hosted sign-in
    #[serde(default)]
    pub client_id: Option<String>,

    /// Redirect target registered with the hosted sign-in
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_endpoint: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            auth_domain: None,
            client_id: None,
            redirect_uri: default_redirect_uri(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ANOTAR_DATA_DIR, ANOTAR_API_ENDPOINT, ...)
    /// 2. Config file (~/.config/anotar/config.toml or ANOTAR_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_ENDPOINT", ENV_PREFIX)) {
            self.api_endpoint = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_INTERVAL", ENV_PREFIX)) {
            if let Ok(secs) = val.trim().parse() {
                self.sync_interval_secs = secs;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_AUTH_DOMAIN", ENV_PREFIX)) {
            self.auth_domain = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_CLIENT_ID", ENV_PREFIX)) {
            self.client_id = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REDIRECT_URI", ENV_PREFIX)) {
            if !val.is_empty() {
                self.redirect_uri = val;
            }
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ANOTAR_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("anotar")
            .join("config.toml")
    }

    /// Get the path of the persisted session token
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("id_token")
    }

    /// Interval between periodic flushes (never shorter than a second)
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anotar")
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_redirect_uri() -> String {
    "http://localhost:5173".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "ANOTAR_DATA_DIR",
        "ANOTAR_API_ENDPOINT",
        "ANOTAR_SYNC_INTERVAL",
        "ANOTAR_AUTH_DOMAIN",
        "ANOTAR_CLIENT_ID",
        "ANOTAR_REDIRECT_URI",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api_endpoint.is_none());
        assert_eq!(config.sync_interval_secs, 5);
        assert_eq!(config.sync_interval(), Duration::from_secs(5));
        assert!(config.data_dir.ends_with("anotar"));
        assert!(config.token_path().ends_with("id_token"));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = Config {
            sync_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_endpoint() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ANOTAR_API_ENDPOINT", "https://api.example.com/prod");
        config.apply_env_overrides();
        assert_eq!(
            config.api_endpoint.as_deref(),
            Some("https://api.example.com/prod")
        );

        // Empty string clears it
        env::set_var("ANOTAR_API_ENDPOINT", "");
        config.apply_env_overrides();
        assert!(config.api_endpoint.is_none());
    }

    #[test]
    fn test_env_override_interval() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ANOTAR_SYNC_INTERVAL", "30");
        config.apply_env_overrides();
        assert_eq!(config.sync_interval_secs, 30);

        // Garbage leaves the previous value alone
        env::set_var("ANOTAR_SYNC_INTERVAL", "often");
        config.apply_env_overrides();
        assert_eq!(config.sync_interval_secs, 30);
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ANOTAR_DATA_DIR", "/tmp/anotar-test");
        config.apply_env_overrides();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/anotar-test"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            api_endpoint = "https://api.example.com"
            sync_interval_secs = 10
            auth_domain = "https://auth.example.com"
            client_id = "abc"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.api_endpoint.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.sync_interval_secs, 10);
        assert_eq!(config.client_id.as_deref(), Some("abc"));
        assert_eq!(config.redirect_uri, "http://localhost:5173");
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            data_dir: PathBuf::from("/data/anotar"),
            api_endpoint: Some("https://api.example.com".to_string()),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.api_endpoint, config.api_endpoint);
        assert_eq!(loaded.sync_interval_secs, config.sync_interval_secs);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.api_endpoint.is_none());
        assert_eq!(config.sync_interval_secs, DEFAULT_SYNC_INTERVAL_SECS);
    }
}
