//! Lending protocol abstraction.
//!
//! The agent only needs three read-only views from the lending contract.
//! Keeping them behind a trait lets the watchlist engine and the decision
//! loop run against an in-memory protocol in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidator_chain::{LendingContract, LendingProtocol, NearRpcClient};
//!
//! let rpc = Arc::new(NearRpcClient::new("https://rpc.mainnet.near.org")?);
//! let contract = LendingContract::new(rpc, "v3.oin_finance.near");
//!
//! let min_ratio = contract.get_liquidation_line().await?;
//! for account in contract.list_liquidatable_accounts().await? {
//!     let ratio = contract.get_user_ratio(&account).await?;
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Read-only surface of the lending contract.
#[async_trait]
pub trait LendingProtocol: Send + Sync + Debug {
    /// Account id of the lending contract (transaction receiver).
    fn contract_id(&self) -> &str;

    /// Current collateralization ratio of `account`. Zero means no debt.
    async fn get_user_ratio(&self, account: &str) -> Result<u128>;

    /// Every account the contract considers for liquidation.
    async fn list_liquidatable_accounts(&self) -> Result<Vec<String>>;

    /// Liquidation threshold: accounts with `0 < ratio < line` can be liquidated.
    async fn get_liquidation_line(&self) -> Result<u128>;
}
