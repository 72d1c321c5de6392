//! Configuration for the local store, remote adapter and save scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bound on remote reads unless configured otherwise.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable holding the remote backend base URL.
pub const REMOTE_URL_ENV: &str = "CAMPUS_REMOTE_URL";

/// Environment variable holding the remote backend API key.
pub const REMOTE_KEY_ENV: &str = "CAMPUS_REMOTE_KEY";

/// Local store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Rewrite a collection journal once it holds this many frames.
    pub compact_after: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./campus-data"),
            create_if_missing: true,
            compact_after: 256,
        }
    }
}

/// Remote backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the REST backend, e.g. `https://db.example.org`.
    pub base_url: String,

    /// Key sent as `apikey` and bearer token.
    pub api_key: String,

    /// Upper bound for select-all calls.
    pub read_timeout: Duration,

    /// Upper bound for writes; `None` leaves them unbounded.
    pub write_timeout: Option<Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: None,
        }
    }
}

impl RemoteConfig {
    /// Read the backend location from the environment.
    ///
    /// Returns `None` when no URL is set, meaning the app runs local-only.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(REMOTE_URL_ENV).ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self {
            base_url,
            api_key: std::env::var(REMOTE_KEY_ENV).unwrap_or_default(),
            ..Default::default()
        })
    }
}

/// Save scheduler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet period after the last mutation before a collection is written.
    pub idle_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_window: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(RemoteConfig::default().read_timeout, Duration::from_secs(5));
        assert!(RemoteConfig::default().write_timeout.is_none());
        assert_eq!(SchedulerConfig::default().idle_window, Duration::from_secs(1));
        assert!(StoreConfig::default().create_if_missing);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: RemoteConfig =
            serde_json::from_str(r#"{"base_url": "http://localhost:54321"}"#).unwrap();
        assert_eq!(config.base_url, "http://localhost:54321");
        assert_eq!(config.read_timeout, Duration::from_secs(5));
    }
}
