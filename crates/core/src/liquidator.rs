//! Liquidation decision loop.
//!
//! Every tick re-reads the live ratio of each watched account and
//! liquidates those below the line. An account is taken off the watchlist
//! before its transaction is built, so one tick never liquidates it twice
//! and later ticks skip it until a refresh brings it back.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

use liquidator_chain::{BroadcastHandle, CryptoHash, TransactionSigner};

use crate::oracle::RatioOracle;
use crate::state::AgentState;
use crate::status::StatusRecorder;

/// `ratio == 0` is an account without debt.
#[inline]
pub fn is_liquidatable(ratio: u128, min_ratio: u128) -> bool {
    ratio > 0 && ratio < min_ratio
}

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub checked: usize,
    pub liquidated: Vec<String>,
    pub restored: Vec<String>,
}

pub struct Liquidator {
    oracle: RatioOracle,
    state: Arc<AgentState>,
    signer: Arc<TransactionSigner>,
    broadcaster: BroadcastHandle,
    status: Arc<dyn StatusRecorder>,
}

impl Liquidator {
    pub fn new(
        oracle: RatioOracle,
        state: Arc<AgentState>,
        signer: Arc<TransactionSigner>,
        broadcaster: BroadcastHandle,
        status: Arc<dyn StatusRecorder>,
    ) -> Self {
        Self {
            oracle,
            state,
            signer,
            broadcaster,
            status,
        }
    }

    pub fn contract_id(&self) -> &str {
        self.oracle.protocol().contract_id()
    }

    /// Run one decision pass over the current watchlist.
    #[instrument(skip(self), level = "debug")]
    pub async fn tick(&self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        let (line, accounts) = self.state.watchlist().view();
        let Some(min_ratio) = line else {
            trace!("No liquidation line yet, skipping tick");
            return outcome;
        };
        if accounts.is_empty() {
            return outcome;
        }
        outcome.checked = accounts.len();

        let mut reads = stream::iter(accounts)
            .map(|account| async move {
                let result = self.oracle.get_ratio(&account).await;
                (account, result)
            })
            .buffer_unordered(self.oracle.max_concurrent());

        // Decide as each read lands
        while let Some((account, result)) = reads.next().await {
            let ratio = match result {
                Ok(ratio) => ratio,
                Err(e) => {
                    warn!(account = %account, error = %e, "Live ratio read failed");
                    continue;
                }
            };

            if !is_liquidatable(ratio, min_ratio) {
                trace!(account = %account, ratio = %ratio, "Above liquidation line");
                continue;
            }

            if self.state.watchlist().remove(&account).is_none() {
                debug!(account = %account, "Already taken off the watchlist");
                continue;
            }

            match self.submit(&account) {
                Ok(tx_hash) => {
                    info!(
                        account = %account,
                        ratio = %ratio,
                        min_ratio = %min_ratio,
                        tx_hash = %tx_hash,
                        "Liquidation queued"
                    );
                    outcome.liquidated.push(account);
                }
                Err(e) => {
                    error!(account = %account, error = %e, "Failed to queue liquidation");
                    self.state.watchlist().restore(&account, ratio);
                    outcome.restored.push(account);
                }
            }
        }

        if !outcome.liquidated.is_empty() {
            self.status.record_liquidations(&outcome.liquidated);
            let fire_at = self.state.scheduler().quarantine(Instant::now());
            info!(
                count = outcome.liquidated.len(),
                refresh_in_ms = fire_at.saturating_duration_since(Instant::now()).as_millis(),
                "Liquidation batch sent, watchlist refresh deferred"
            );
        }

        outcome
    }

    // Signing takes the next nonce. If the enqueue then fails that nonce is
    // never broadcast; NEAR only requires nonces to increase, so the gap is fine.
    fn submit(&self, account: &str) -> Result<CryptoHash> {
        let signed = self
            .signer
            .sign_liquidation(self.contract_id(), account)
            .context("failed to sign liquidation")?;
        let hash = self
            .broadcaster
            .enqueue(account, signed)
            .context("failed to enqueue liquidation")?;
        Ok(hash)
    }
}
