//! Farmhand configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cards::{BadgeSort, FarmSettings};
use crate::market::MonitorSettings;
use crate::scheduler::EngineConfig;

const CONFIG_NAME: &str = "farmhand.yml";

/// Main farmhand configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Card farming
    pub cards: CardsConfig,

    /// Market monitoring
    pub market: MarketConfig,
}

impl Config {
    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        self.cards.engine_config().validate().context("Invalid cards config")?;
        self.market.engine_config().validate().context("Invalid market config")?;
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise `./farmhand.yml`, then
    /// `<config_dir>/farmhand/farmhand.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Any failure is silent here; [`load`](Self::load) reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => default_paths(),
        };
        paths
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| fs::read_to_string(path).ok())
            .and_then(|content| serde_yaml::from_str::<Config>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("farmhand").join(CONFIG_NAME));
    }
    paths
}

/// Card farming configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardsConfig {
    /// Games played at once
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Farm badges in reverse order
    pub reverse: bool,

    /// Initial badge order
    pub sort: BadgeSort,

    /// Time played between drop checks
    #[serde(rename = "wait-interval-ms")]
    pub wait_interval_ms: u64,

    /// Random extra wait on top of the interval
    #[serde(rename = "wait-jitter-ms")]
    pub wait_jitter_ms: u64,

    /// Waiting progress granularity
    #[serde(rename = "tick-ms")]
    pub tick_ms: u64,

    /// Back-off after a transient error
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            reverse: false,
            sort: BadgeSort::None,
            wait_interval_ms: 15 * 60 * 1000,
            wait_jitter_ms: 0,
            tick_ms: 1000,
            retry_delay_ms: 30_000,
        }
    }
}

impl CardsConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.max_concurrency).reversed(self.reverse)
    }

    pub fn farm_settings(&self) -> FarmSettings {
        FarmSettings {
            wait_interval: Duration::from_millis(self.wait_interval_ms),
            wait_jitter: Duration::from_millis(self.wait_jitter_ms),
            tick: Duration::from_millis(self.tick_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Market monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Order books polled at once
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: usize,

    /// Wait between polls of one book
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Back-off after a transient error
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Polls per book before stopping, 0 for no limit
    #[serde(rename = "max-rounds")]
    pub max_rounds: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 2,
            poll_interval_ms: 60_000,
            retry_delay_ms: 30_000,
            max_rounds: 0,
        }
    }
}

impl MarketConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.max_concurrency)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_rounds: self.max_rounds,
        }
    }
}
