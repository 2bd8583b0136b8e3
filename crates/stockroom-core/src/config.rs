//! Application configuration.
//!
//! `AppConfig` is persisted under the `app-config` key of the key/value
//! store. Turning `api_enabled` off suspends both health polling and token
//! refresh scheduling. Persistent state lives under
//! `<data dir>/stockroom/` unless `STOCKROOM_DATA_DIR` points elsewhere.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{load_json, save_json, KeyValueStore};

/// Application name used for data directory paths
const APP_NAME: &str = "stockroom";

pub const CONFIG_KEY: &str = "app-config";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

const DEFAULT_VERSION: &str = "1.0.0";

/// Overrides the configured base URL.
pub const BASE_URL_ENV: &str = "STOCKROOM_BASE_URL";

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "STOCKROOM_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AppConfig {
    #[serde(rename = "apiEnabled")]
    pub api_enabled: bool,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

/// Partial update merged by `AppConfig::apply`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub api_enabled: Option<bool>,
    pub base_url: Option<String>,
    pub version: Option<String>,
}

impl ConfigPatch {
    pub fn api_enabled(enabled: bool) -> Self {
        Self {
            api_enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn base_url(url: impl Into<String>) -> Self {
        Self {
            base_url: Some(url.into()),
            ..Default::default()
        }
    }
}

impl AppConfig {
    /// Load the persisted config, falling back to defaults when absent or malformed.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        load_json(store, CONFIG_KEY).unwrap_or_default()
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        save_json(store, CONFIG_KEY, self)
    }

    /// The cleared configuration: defaults with the API switched off.
    pub fn disabled() -> Self {
        Self {
            api_enabled: false,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(enabled) = patch.api_enabled {
            self.api_enabled = enabled;
        }
        if let Some(url) = patch.base_url {
            self.base_url = url;
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
    }

    /// Apply `STOCKROOM_BASE_URL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }
}

/// Directory for persisted session, config and cache data.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
    Ok(base.join(APP_NAME))
}

/// Refresh every 6 hours; tokens are valid for 7 days.
pub const TOKEN_REFRESH_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// Check backend health once a minute.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

/// Checks slower than this count as unhealthy.
pub const HEALTHY_LATENCY_MS: f64 = 5000.0;

/// Intervals and thresholds for the orchestrator's timers.
#[derive(Debug, Clone)]
pub struct Timings {
    pub refresh_interval: Duration,
    pub health_interval: Duration,
    pub healthy_latency_ms: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(TOKEN_REFRESH_INTERVAL_SECS),
            health_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS),
            healthy_latency_ms: HEALTHY_LATENCY_MS,
        }
    }
}

impl Timings {
    /// Clamp zero intervals, which `tokio::time::interval` rejects.
    pub fn validated(mut self) -> Self {
        if self.refresh_interval.is_zero() {
            warn!("refresh_interval is zero, using default");
            self.refresh_interval = Duration::from_secs(TOKEN_REFRESH_INTERVAL_SECS);
        }
        if self.health_interval.is_zero() {
            warn!("health_interval is zero, using default");
            self.health_interval = Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS);
        }
        self
    }
}
