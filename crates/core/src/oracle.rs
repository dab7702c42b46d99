//! Account ratio reads with a timeout per read.

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use liquidator_chain::LendingProtocol;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("ratio read timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

/// Reads live collateralization ratios from the lending contract.
/// Holds no state besides its limits.
#[derive(Debug, Clone)]
pub struct RatioOracle {
    protocol: Arc<dyn LendingProtocol>,
    read_timeout: Duration,
    max_concurrent: usize,
}

impl RatioOracle {
    pub fn new(protocol: Arc<dyn LendingProtocol>, read_timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            protocol,
            read_timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn protocol(&self) -> &Arc<dyn LendingProtocol> {
        &self.protocol
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    async fn bounded<T, F>(&self, read: F) -> Result<T, ReadError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match timeout(self.read_timeout, read).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ReadError::Timeout(self.read_timeout)),
        }
    }

    /// Ratio of a single account. No retry.
    pub async fn get_ratio(&self, account_id: &str) -> Result<u128, ReadError> {
        self.bounded(self.protocol.get_user_ratio(account_id)).await
    }

    /// Current liquidation threshold.
    pub async fn liquidation_line(&self) -> Result<u128, ReadError> {
        self.bounded(self.protocol.get_liquidation_line()).await
    }

    /// Accounts the contract lists as liquidation candidates.
    pub async fn candidates(&self) -> Result<Vec<String>, ReadError> {
        self.bounded(self.protocol.list_liquidatable_accounts()).await
    }

    /// Ratios for many accounts with bounded parallelism.
    /// Results come back in the order of `accounts`.
    pub async fn get_ratios(&self, accounts: &[String]) -> Vec<(String, Result<u128, ReadError>)> {
        let mut results: Vec<_> = stream::iter(accounts.iter().cloned().enumerate())
            .map(|(index, account)| async move {
                let result = self.get_ratio(&account).await;
                (index, account, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        results.sort_unstable_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, account, result)| (account, result))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProtocol;

    #[tokio::test(start_paused = true)]
    async fn test_reads_in_input_order() {
        let protocol = Arc::new(MockProtocol::new(100));
        protocol.set_ratio("a.near", 50);
        protocol.set_ratio("b.near", 10);
        protocol.set_delay("a.near", Duration::from_millis(500));

        let oracle = RatioOracle::new(protocol, Duration::from_secs(5), 4);
        let results = oracle
            .get_ratios(&["a.near".to_string(), "b.near".to_string()])
            .await;

        assert_eq!(results[0].0, "a.near");
        assert_eq!(results[0].1.as_ref().unwrap(), &50);
        assert_eq!(results[1].0, "b.near");
        assert_eq!(results[1].1.as_ref().unwrap(), &10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_read_times_out() {
        let protocol = Arc::new(MockProtocol::new(100));
        protocol.set_ratio("slow.near", 50);
        protocol.set_delay("slow.near", Duration::from_secs(3600));

        let oracle = RatioOracle::new(protocol, Duration::from_secs(2), 4);
        let start = tokio::time::Instant::now();
        let err = oracle.get_ratio("slow.near").await.unwrap_err();

        assert!(matches!(err, ReadError::Timeout(_)));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_remote_error_propagates() {
        let protocol = Arc::new(MockProtocol::new(100));
        protocol.set_failing("broken.near");

        let oracle = RatioOracle::new(protocol, Duration::from_secs(2), 4);
        let err = oracle.get_ratio("broken.near").await.unwrap_err();
        assert!(matches!(err, ReadError::Remote(_)));
    }
}
