//! Liquidator core logic.
//!
//! This crate provides the agent itself:
//! - Bounded watchlist of the accounts closest to liquidation
//! - Watchlist engine (periodic rebuild from the lending contract)
//! - Liquidation decision loop over live ratio reads
//! - Refresh scheduling with a post-liquidation quarantine
//! - Status document for operators
//! - Agent orchestration of the periodic cycles

mod agent;
pub mod config;
mod engine;
mod liquidator;
mod oracle;
mod schedule;
mod state;
mod status;
mod watchlist;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentDeps, AgentTasks};
pub use config::{BotConfig, ConfigError, Network, NetworkConfig};
pub use engine::WatchlistEngine;
pub use liquidator::{is_liquidatable, Liquidator, TickOutcome};
pub use oracle::{RatioOracle, ReadError};
pub use schedule::{RefreshScheduler, RefreshState};
pub use state::AgentState;
pub use status::{JsonStatusFile, StatusDocument, StatusEntry, StatusRecorder};
pub use watchlist::{AccountRatio, SharedWatchlist, Watchlist, MAX_WATCHLIST_CAPACITY};
