//! Configuration for the liquidation agent.
//!
//! This module provides:
//! - Bot runtime configuration (profiles, timings, sizes, gas)
//! - Network selection (node URL, contract, signer account, credentials)

mod bot;
mod network;

pub use bot::{
    AccessKeyConfig, BotConfig, DecisionConfig, StatusConfig, TransactionConfig, WatchlistConfig,
};
pub use network::{
    validate_account_id, ConfigError, Network, NetworkConfig, MAINNET_LENDING_CONTRACT,
};
