//! Watchlist engine.
//!
//! Each cycle pulls the liquidation line and the candidate list from the
//! contract, reads every candidate's ratio with bounded parallelism, keeps
//! the worst accounts and publishes them together with the new line.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::oracle::RatioOracle;
use crate::state::AgentState;
use crate::status::StatusRecorder;
use crate::watchlist::{AccountRatio, Watchlist};

pub struct WatchlistEngine {
    oracle: RatioOracle,
    state: Arc<AgentState>,
    status: Arc<dyn StatusRecorder>,
    size: usize,
}

impl WatchlistEngine {
    pub fn new(
        oracle: RatioOracle,
        state: Arc<AgentState>,
        status: Arc<dyn StatusRecorder>,
        size: usize,
    ) -> Self {
        Self {
            oracle,
            state,
            status,
            size,
        }
    }

    /// Rebuild and publish the watchlist.
    ///
    /// Failing to read the line or the candidate list fails the cycle and
    /// leaves the previous list and line in place. Individual ratio reads
    /// that fail only drop that account for this cycle.
    ///
    /// Returns `None` when a liquidation claimed an account while the reads
    /// were in flight; those reads may predate it, so nothing is published.
    #[instrument(skip(self), fields(contract = %self.oracle.protocol().contract_id()))]
    pub async fn refresh(&self) -> Result<Option<Watchlist>> {
        let start = Instant::now();
        let epoch = self.state.watchlist().epoch();

        let min_ratio = self
            .oracle
            .liquidation_line()
            .await
            .context("failed to fetch liquidation line")?;
        let candidates = self
            .oracle
            .candidates()
            .await
            .context("failed to fetch candidate accounts")?;

        let mut failed = 0usize;
        let mut valid = Vec::with_capacity(candidates.len());
        for (account, result) in self.oracle.get_ratios(&candidates).await {
            match result {
                Ok(ratio) => valid.push(AccountRatio::new(account, ratio)),
                Err(e) => {
                    failed += 1;
                    warn!(account = %account, error = %e, "Skipping account, ratio read failed");
                }
            }
        }

        let list = Watchlist::from_candidates(self.size, valid);
        if !self.state.publish(list.clone(), min_ratio, epoch) {
            info!(
                listed = list.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Liquidation during refresh, result discarded"
            );
            return Ok(None);
        }
        let accounts = list.account_ids();
        self.status.record_watchlist(&accounts);

        info!(
            candidates = candidates.len(),
            listed = list.len(),
            failed,
            min_ratio = %min_ratio,
            elapsed_ms = start.elapsed().as_millis(),
            "Watchlist refreshed"
        );
        for entry in list.entries() {
            debug!(account = %entry.account_id, ratio = %entry.ratio, "Watching");
        }

        Ok(Some(list))
    }
}
