//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/vplanet/config.toml)
//! 3. Environment variables (VPLANET_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::sync::SyncConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "VPLANET";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the VideoPlanet API server
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Push channel URL override. When unset, derived from `api_url`
    /// (http -> ws, https -> wss, path /ws/calendar/).
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Bearer token for authenticated requests (optional)
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Poll interval while the push channel is down, in seconds
    #[serde(default = "default_fast_poll_secs")]
    pub fast_poll_secs: u64,

    /// Poll interval while the push channel is open, in seconds
    #[serde(default = "default_slow_poll_secs")]
    pub slow_poll_secs: u64,

    /// Initial reconnect delay, in milliseconds
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Maximum number of reconnect attempts before settling on poll-only
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Delay between a successful mutation and its sync nudge, in
    /// milliseconds. A propagation heuristic, not a guarantee.
    #[serde(default = "default_nudge_delay_ms")]
    pub nudge_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            auth_token: None,
            fast_poll_secs: default_fast_poll_secs(),
            slow_poll_secs: default_slow_poll_secs(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            nudge_delay_ms: default_nudge_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (VPLANET_API_URL, VPLANET_WS_URL, VPLANET_TOKEN)
    /// 2. Config file (~/.config/vplanet/config.toml or VPLANET_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
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
        // VPLANET_API_URL
        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        // VPLANET_WS_URL
        if let Ok(val) = std::env::var(format!("{}_WS_URL", ENV_PREFIX)) {
            self.ws_url = if val.is_empty() { None } else { Some(val) };
        }

        // VPLANET_TOKEN
        if let Ok(val) = std::env::var(format!("{}_TOKEN", ENV_PREFIX)) {
            self.auth_token = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with VPLANET_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vplanet")
            .join("config.toml")
    }

    /// Push channel URL: explicit override, or derived from the API URL
    /// with the scheme-appropriate ws/wss variant at /ws/calendar/.
    pub fn push_url(&self) -> Result<Url> {
        if let Some(ref ws) = self.ws_url {
            return Url::parse(ws).with_context(|| format!("Invalid ws_url: {}", ws));
        }

        let mut url =
            Url::parse(&self.api_url).with_context(|| format!("Invalid api_url: {}", self.api_url))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("Cannot derive ws scheme from: {}", self.api_url))?;
        url.set_path("/ws/calendar/");
        url.set_query(None);
        Ok(url)
    }

    /// Build the sync engine configuration from these settings
    pub fn sync_config(&self) -> Result<SyncConfig> {
        Ok(SyncConfig {
            push_url: self.push_url()?,
            fast_poll: Duration::from_secs(self.fast_poll_secs),
            slow_poll: Duration::from_secs(self.slow_poll_secs),
            reconnect_base: Duration::from_millis(self.reconnect_base_ms),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_max_attempts: self.reconnect_max_attempts,
            nudge_delay: Duration::from_millis(self.nudge_delay_ms),
        })
    }
}

/// Default API base URL
fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_fast_poll_secs() -> u64 {
    5
}

fn default_slow_poll_secs() -> u64 {
    30
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_nudge_delay_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
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

    const ENV_VARS: &[&str] = &["VPLANET_API_URL", "VPLANET_WS_URL", "VPLANET_TOKEN"];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(config.ws_url.is_none());
        assert_eq!(config.fast_poll_secs, 5);
        assert_eq!(config.slow_poll_secs, 30);
        assert_eq!(config.reconnect_max_attempts, 5);
    }

    #[test]
    fn test_push_url_derived_from_http() {
        let config = Config::default();
        let url = config.push_url().unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/calendar/");
    }

    #[test]
    fn test_push_url_derived_from_https() {
        let config = Config {
            api_url: "https://app.videoplanet.example".to_string(),
            ..Default::default()
        };
        let url = config.push_url().unwrap();
        assert_eq!(url.as_str(), "wss://app.videoplanet.example/ws/calendar/");
    }

    #[test]
    fn test_push_url_explicit_override() {
        let config = Config {
            ws_url: Some("wss://push.videoplanet.example/ws/calendar/".to_string()),
            ..Default::default()
        };
        let url = config.push_url().unwrap();
        assert_eq!(url.host_str(), Some("push.videoplanet.example"));
    }

    #[test]
    fn test_env_override_api_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("VPLANET_API_URL", "https://staging.example.com");
        config.apply_env_overrides();

        assert_eq!(config.api_url, "https://staging.example.com");
    }

    #[test]
    fn test_env_override_token() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(config.auth_token.is_none());

        env::set_var("VPLANET_TOKEN", "abc123");
        config.apply_env_overrides();
        assert_eq!(config.auth_token.as_deref(), Some("abc123"));

        // Empty string clears it
        env::set_var("VPLANET_TOKEN", "");
        config.apply_env_overrides();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            api_url = "https://review.example.com"
            fast_poll_secs = 2
            nudge_delay_ms = 250
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.api_url, "https://review.example.com");
        assert_eq!(config.fast_poll_secs, 2);
        assert_eq!(config.nudge_delay_ms, 250);
        // Unspecified keys fall back to defaults
        assert_eq!(config.slow_poll_secs, 30);
    }

    #[test]
    fn test_load_from_path_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://files.example.com\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.api_url, "http://files.example.com");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            api_url: "https://review.example.com".to_string(),
            ws_url: Some("wss://push.example.com/ws/calendar/".to_string()),
            auth_token: Some("token".to_string()),
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api_url, config.api_url);
        assert_eq!(parsed.ws_url, config.ws_url);
        assert_eq!(parsed.auth_token, config.auth_token);
    }

    #[test]
    fn test_sync_config_durations() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("fast_poll_secs = 1").unwrap();
        let sync = config.sync_config().unwrap();
        assert_eq!(sync.fast_poll, Duration::from_secs(1));
        assert_eq!(sync.slow_poll, Duration::from_secs(30));
        assert_eq!(sync.reconnect_max_delay, Duration::from_secs(30));
    }
}
