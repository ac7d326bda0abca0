//! Configuration for SetuIO
//!
//! Loads configuration from a TOML file. Every section is optional and falls
//! back to the values of the reference session, so an empty file (or no file
//! at all) yields a working setup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scanner driver selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Driver name (`slamtec`, or `mock` with the `mock` feature)
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Upper bound for any single blocking device exchange
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_driver() -> String {
    "slamtec".to_string()
}
fn default_timeout_ms() -> u64 {
    2000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Outbound datagram destination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenderConfig {
    /// Destination host (numeric IP or resolvable name)
    #[serde(default = "default_sender_address")]
    pub address: String,
    /// Destination UDP port
    #[serde(default = "default_sender_port")]
    pub port: u16,
}

fn default_sender_address() -> String {
    "127.0.0.1".to_string()
}
fn default_sender_port() -> u16 {
    7000
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            address: default_sender_address(),
            port: default_sender_port(),
        }
    }
}

/// Serial link settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Candidate baud rates tried in order when none is given on the command line
    #[serde(default = "default_baud_rates")]
    pub baud_rates: Vec<u32>,
}

fn default_baud_rates() -> Vec<u32> {
    vec![115200, 256000]
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rates: default_baud_rates(),
        }
    }
}

/// Acquisition loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Maximum samples taken per grab
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Pause after stop-scan so the motor can decelerate
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Right shift applied to the raw quality byte
    #[serde(default = "default_quality_shift")]
    pub quality_shift: u8,
    /// Log loop statistics every N acquired scans (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
}

fn default_capacity() -> usize {
    8192
}
fn default_settle_delay_ms() -> u64 {
    200
}
fn default_quality_shift() -> u8 {
    crate::devices::slamtec::QUALITY_SHIFT
}
fn default_stats_interval() -> u64 {
    100
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            settle_delay_ms: default_settle_delay_ms(),
            quality_shift: default_quality_shift(),
            stats_interval: default_stats_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.scan.capacity == 0 {
            return Err(Error::Config("scan.capacity must be positive".to_string()));
        }
        if self.scan.quality_shift >= 8 {
            return Err(Error::Config(format!(
                "scan.quality_shift must be below 8, got {}",
                self.scan.quality_shift
            )));
        }
        if self.serial.baud_rates.is_empty() {
            return Err(Error::Config(
                "serial.baud_rates must list at least one rate".to_string(),
            ));
        }
        if self.sender.port == 0 {
            return Err(Error::Config("sender.port must be non-zero".to_string()));
        }
        if self.sender.address.trim().is_empty() {
            return Err(Error::Config("sender.address is empty".to_string()));
        }
        Ok(())
    }
}
