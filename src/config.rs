//! Configuration management for Region-Oxide

use crate::region::markup::RegionMarkup;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Library configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CDP WebSocket endpoint of the page to drive
    pub cdp_endpoint: String,

    /// How long an element handle polls for its locator, in milliseconds
    pub element_timeout_ms: u64,

    /// Interval between polls of any wait, in milliseconds
    pub poll_interval_ms: u64,

    /// Completion signal timeout for data updates (sort, filter, paging, insert, delete)
    pub update_timeout_ms: u64,

    /// Completion signal timeout for row selection changes
    pub selection_timeout_ms: u64,

    /// Timeout for a full page navigation
    pub navigation_timeout_ms: u64,

    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,

    /// Page markup conventions of the data region
    pub markup: RegionMarkup,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp_endpoint: "ws://localhost:9222".to_string(),
            element_timeout_ms: 10_000,
            poll_interval_ms: 100,
            update_timeout_ms: 30_000,
            selection_timeout_ms: 10_000,
            navigation_timeout_ms: 60_000,
            log_level: "info".to_string(),
            markup: RegionMarkup::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = env::var("REGION_CDP_ENDPOINT") {
            config.cdp_endpoint = endpoint;
        }

        if let Some(ms) = parse_ms("REGION_ELEMENT_TIMEOUT")? {
            config.element_timeout_ms = ms;
        }

        if let Some(ms) = parse_ms("REGION_POLL_INTERVAL")? {
            config.poll_interval_ms = ms;
        }

        if let Some(ms) = parse_ms("REGION_UPDATE_TIMEOUT")? {
            config.update_timeout_ms = ms;
        }

        if let Some(ms) = parse_ms("REGION_SELECTION_TIMEOUT")? {
            config.selection_timeout_ms = ms;
        }

        if let Some(ms) = parse_ms("REGION_NAVIGATION_TIMEOUT")? {
            config.navigation_timeout_ms = ms;
        }

        if let Ok(log_level) = env::var("REGION_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::configuration("poll_interval_ms must be positive"));
        }
        self.tracing_level()?;
        Ok(())
    }

    /// `log_level` as a tracing level
    pub fn tracing_level(&self) -> Result<Level> {
        self.log_level
            .parse()
            .map_err(|_| Error::configuration(format!("Invalid log_level '{}'", self.log_level)))
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn parse_ms(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::configuration(format!("Invalid {}", var))),
        Err(_) => Ok(None),
    }
}
