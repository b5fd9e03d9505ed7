//! Runtime settings
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `MEDSCOUT_*` environment variables (`__` separates nested keys, e.g.
//! `MEDSCOUT_SEARCH__PARALLEL=true`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "medscout.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from `path` (if it exists) and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MEDSCOUT_").split("__"))
            .extract()?;
        Ok(settings)
    }
}

/// Retailer search behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Pool of browser user agents, one is picked per request
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
    #[serde(default = "default_detail_timeout")]
    pub detail_timeout_secs: u64,
    #[serde(default = "default_enrich_timeout")]
    pub enrich_timeout_secs: u64,
    /// Records kept per source
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Candidates refetched individually when a list page lacks ratings
    #[serde(default = "default_enrich_limit")]
    pub enrich_limit: usize,
    /// Pause between per-candidate page fetches
    #[serde(default = "default_enrich_delay")]
    pub enrich_delay_ms: u64,
    /// Query the retailers on separate threads
    #[serde(default)]
    pub parallel: bool,
}

impl SearchConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_secs(self.enrich_timeout_secs)
    }

    pub fn enrich_delay(&self) -> Duration {
        Duration::from_millis(self.enrich_delay_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            user_agents: default_user_agents(),
            list_timeout_secs: default_list_timeout(),
            detail_timeout_secs: default_detail_timeout(),
            enrich_timeout_secs: default_enrich_timeout(),
            max_results: default_max_results(),
            enrich_limit: default_enrich_limit(),
            enrich_delay_ms: default_enrich_delay(),
            parallel: false,
        }
    }
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_list_timeout() -> u64 {
    10
}

fn default_detail_timeout() -> u64 {
    15
}

fn default_enrich_timeout() -> u64 {
    5
}

fn default_max_results() -> usize {
    5
}

fn default_enrich_limit() -> usize {
    10
}

fn default_enrich_delay() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("medscout.db")
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}
