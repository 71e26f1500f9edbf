//! Configuration loading from TOML.
//!
//! Reads `config.toml` into strongly-typed sections. Every field has
//! a default matching the documented behavior, so a partial (or
//! empty) file is valid; only an unreadable or malformed file is an
//! error.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::arbitrage::scanner::ScanConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub scan: ScanConfig,
    pub fetch: FetchConfig,
}

/// Locations of the raw input tables and the report directory.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub spot_csv: String,
    pub binary_csv: String,
    pub vanilla_csv: String,
    pub reports_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            spot_csv: "data/raw/spot.csv".to_string(),
            binary_csv: "data/raw/binary.csv".to_string(),
            vanilla_csv: "data/raw/vanilla.csv".to_string(),
            reports_dir: "reports/tables".to_string(),
        }
    }
}

/// Venue fetch parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// Underlying currency symbol ("BTC" or "ETH").
    pub underlying: String,
    /// Target the earliest option expiry at least this many days out.
    pub min_days_to_expiry: i64,
    /// Page size for Gamma market discovery.
    pub gamma_page_limit: u32,
    /// Chain instruments kept per snapshot, nearest the money first.
    pub max_strikes: usize,
    /// Days of daily spot VWAP history to build. 0 records only
    /// today's index price.
    pub spot_history_days: i64,
    /// VWAP window around 08:00 UTC, in minutes.
    pub vwap_window_minutes: i64,
    pub http: HttpConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            underlying: "BTC".to_string(),
            min_days_to_expiry: 7,
            gamma_page_limit: 400,
            max_strikes: 80,
            spot_history_days: 0,
            vwap_window_minutes: 30,
            http: HttpConfig::default(),
        }
    }
}

/// HTTP client and retry tuning shared by both venue clients.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 30,
            max_retries: 5,
            backoff_base_ms: 1500,
            backoff_max_ms: 20_000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}
