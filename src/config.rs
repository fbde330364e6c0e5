//! Layered configuration for the watcher subsystem.
//!
//! Values resolve in order: built-in defaults, then a TOML file, then
//! environment variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `PW_` and use double underscores to
//! separate nested levels:
//! - `PW_WATCH__DEBOUNCE_SECS=5` sets `watch.debounce_secs`
//! - `PW_WATCH__ENABLED=false` sets `watch.enabled`
//! - `PW_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "panewatch.toml";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Watcher behavior.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Diagnostic logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Watcher behavior settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Whether the host should enable the watcher at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiescence window in whole seconds, read at every arm. Values
    /// below 1 are clamped to 1 at arm time.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
}

/// Logging levels: a default plus per-module overrides.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for everything without an override.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module levels, e.g. `watcher = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_debounce_secs() -> u64 {
    2
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific file plus env overrides.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PW_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }
}
