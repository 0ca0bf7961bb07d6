//! Configuration types and loading

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub static_records: Vec<StaticRecord>,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Which SRV service to track
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub proto: String,
    pub domain: String,
}

/// Reconnect backoff tuning
#[derive(Debug, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_backoff_percent")]
    pub backoff_percent: u64,
    #[serde(default = "default_randomize_percent")]
    pub randomize_percent: u64,
}

/// An SRV record merged into every lookup
#[derive(Debug, Deserialize)]
pub struct StaticRecord {
    #[serde(default)]
    pub ttl: u32,
    pub priority: u16,
    #[serde(default)]
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Monitor behavior
#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    /// Where to expose Prometheus metrics
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
    /// Quiet period after connect before the link counts as established
    #[serde(default = "default_established_after_secs")]
    pub established_after_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            backoff_percent: default_backoff_percent(),
            randomize_percent: default_randomize_percent(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metrics_addr: default_metrics_addr(),
            established_after_secs: default_established_after_secs(),
        }
    }
}

fn default_min_ms() -> u64 {
    1000
}

fn default_max_ms() -> u64 {
    20_000
}

fn default_backoff_percent() -> u64 {
    50
}

fn default_randomize_percent() -> u64 {
    10
}

fn default_metrics_addr() -> SocketAddr {
    "127.0.0.1:9184".parse().expect("valid default address")
}

fn default_established_after_secs() -> u64 {
    5
}

impl Config {
    /// Resolve the config path: `--config` flag, then `LINK_MONITOR_CONFIG`,
    /// then `link-monitor.toml` next to the working directory.
    pub fn resolve_path(cli: Option<&str>) -> PathBuf {
        if let Some(path) = cli {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("LINK_MONITOR_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("link-monitor.toml")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
