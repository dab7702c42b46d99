//! Configuration management with profile support.
//!
//! Provides centralized configuration for all agent parameters with
//! support for different profiles (default, testing, aggressive) or a
//! TOML file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use liquidator_chain::{DEFAULT_LIQUIDATION_GAS, DEFAULT_QUEUE_CAPACITY};

use crate::watchlist::MAX_WATCHLIST_CAPACITY;

/// Main configuration structure containing all agent parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Watchlist engine sizing and cadence
    #[serde(default)]
    pub watchlist: WatchlistConfig,

    /// Liquidation decision loop cadence
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Nonce/block-hash refresh cadence
    #[serde(default)]
    pub access_key: AccessKeyConfig,

    /// Transaction building and submission
    #[serde(default)]
    pub transaction: TransactionConfig,

    /// Status document location
    #[serde(default)]
    pub status: StatusConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Watchlist engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Number of worst accounts kept on the shortlist
    #[serde(default = "default_watchlist_size")]
    pub size: usize,

    /// Full refresh interval (seconds)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Delay before the one-shot refresh after a liquidation (seconds).
    /// The RPC keeps serving pre-liquidation state for a while.
    #[serde(default = "default_quarantine_delay")]
    pub quarantine_delay_secs: u64,

    /// Maximum ratio reads in flight during a refresh
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,

    /// Timeout for a single ratio read (milliseconds)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_watchlist_size() -> usize {
    5
}
fn default_refresh_interval() -> u64 {
    300
}
fn default_quarantine_delay() -> u64 {
    10
}
fn default_max_concurrent_reads() -> usize {
    32
}
fn default_read_timeout() -> u64 {
    5_000
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            size: default_watchlist_size(),
            refresh_interval_secs: default_refresh_interval(),
            quarantine_delay_secs: default_quarantine_delay(),
            max_concurrent_reads: default_max_concurrent_reads(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl WatchlistConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
    pub fn quarantine_delay(&self) -> Duration {
        Duration::from_secs(self.quarantine_delay_secs)
    }
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Decision loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Interval between decision ticks (milliseconds)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    1_000
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl DecisionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Access key refresh parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyConfig {
    /// Nonce/block-hash refresh interval (seconds)
    #[serde(default = "default_access_key_interval")]
    pub refresh_interval_secs: u64,
}

fn default_access_key_interval() -> u64 {
    600
}

impl Default for AccessKeyConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_access_key_interval(),
        }
    }
}

impl AccessKeyConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Transaction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Gas attached to each liquidation call
    #[serde(default = "default_gas")]
    pub gas: u64,

    /// Signed transactions allowed to wait for submission
    #[serde(default = "default_broadcast_queue")]
    pub broadcast_queue_size: usize,
}

fn default_gas() -> u64 {
    DEFAULT_LIQUIDATION_GAS
}
fn default_broadcast_queue() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            gas: default_gas(),
            broadcast_queue_size: default_broadcast_queue(),
        }
    }
}

/// Status document parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Path of the JSON status document
    #[serde(default = "default_status_path")]
    pub path: String,
}

fn default_status_path() -> String {
    "status-logs.json".to_string()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: default_status_path(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            watchlist: WatchlistConfig::default(),
            decision: DecisionConfig::default(),
            access_key: AccessKeyConfig::default(),
            transaction: TransactionConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Short cycles for exercising the agent against testnet.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            watchlist: WatchlistConfig {
                size: 10,
                refresh_interval_secs: 60,
                quarantine_delay_secs: 5,
                max_concurrent_reads: 8,
                read_timeout_ms: 3_000,
            },
            decision: DecisionConfig {
                tick_interval_ms: 2_000,
            },
            access_key: AccessKeyConfig {
                refresh_interval_secs: 120,
            },
            transaction: TransactionConfig::default(),
            status: StatusConfig::default(),
        }
    }

    /// Faster polling for contested markets.
    pub fn aggressive() -> Self {
        Self {
            profile: "aggressive".to_string(),
            watchlist: WatchlistConfig {
                size: 10,
                refresh_interval_secs: 120,
                quarantine_delay_secs: 10,
                max_concurrent_reads: 64,
                read_timeout_ms: 1_500,
            },
            decision: DecisionConfig {
                tick_interval_ms: 400, // Roughly one block
            },
            access_key: AccessKeyConfig {
                refresh_interval_secs: 300,
            },
            transaction: TransactionConfig::default(),
            status: StatusConfig::default(),
        }
    }

    /// Get profile from environment variable BOT_PROFILE, or default.
    /// Supported values: default, testing, aggressive, or a path to a TOML file.
    pub fn from_env() -> anyhow::Result<Self> {
        let profile = std::env::var("BOT_PROFILE").unwrap_or_else(|_| "default".to_string());
        match profile.to_lowercase().as_str() {
            "default" | "" => Ok(Self::default()),
            "testing" | "test" => Ok(Self::testing()),
            "aggressive" | "aggro" => Ok(Self::aggressive()),
            _ if profile.ends_with(".toml") => Self::from_file(&profile),
            other => anyhow::bail!("Unknown BOT_PROFILE '{}'", other),
        }
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.watchlist.size == 0 || self.watchlist.size > MAX_WATCHLIST_CAPACITY {
            anyhow::bail!(
                "watchlist.size must be between 1 and {}, got {}",
                MAX_WATCHLIST_CAPACITY,
                self.watchlist.size
            );
        }
        if self.watchlist.max_concurrent_reads == 0 {
            anyhow::bail!("watchlist.max_concurrent_reads must be positive");
        }
        if self.decision.tick_interval_ms == 0
            || self.watchlist.refresh_interval_secs == 0
            || self.access_key.refresh_interval_secs == 0
        {
            anyhow::bail!("intervals must be positive");
        }
        if self.transaction.gas == 0 {
            anyhow::bail!("transaction.gas must be positive");
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            size = self.watchlist.size,
            refresh_secs = self.watchlist.refresh_interval_secs,
            quarantine_secs = self.watchlist.quarantine_delay_secs,
            max_concurrent_reads = self.watchlist.max_concurrent_reads,
            read_timeout_ms = self.watchlist.read_timeout_ms,
            "Watchlist parameters"
        );
        tracing::info!(
            tick_ms = self.decision.tick_interval_ms,
            access_key_secs = self.access_key.refresh_interval_secs,
            "Loop timing"
        );
        tracing::info!(
            gas = self.transaction.gas,
            queue = self.transaction.broadcast_queue_size,
            status_path = %self.status.path,
            "Transaction parameters"
        );
    }
}
