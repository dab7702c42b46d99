//! Process-wide agent state shared by the periodic tasks.

use crate::config::BotConfig;
use crate::schedule::RefreshScheduler;
use crate::watchlist::{SharedWatchlist, Watchlist};

/// Shortlist, liquidation threshold and refresh schedule.
#[derive(Debug)]
pub struct AgentState {
    watchlist: SharedWatchlist,
    scheduler: RefreshScheduler,
}

impl AgentState {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            watchlist: SharedWatchlist::new(config.watchlist.size),
            scheduler: RefreshScheduler::new(
                config.watchlist.refresh_interval(),
                config.watchlist.quarantine_delay(),
            ),
        }
    }

    pub fn watchlist(&self) -> &SharedWatchlist {
        &self.watchlist
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Unknown until the first successful refresh.
    pub fn min_ratio(&self) -> Option<u128> {
        self.watchlist.min_ratio()
    }

    /// Install the result of a refresh cycle that started at `epoch`.
    /// Returns false when a liquidation claimed an account meanwhile.
    pub fn publish(&self, list: Watchlist, min_ratio: u128, epoch: u64) -> bool {
        self.watchlist.publish(list, min_ratio, epoch)
    }
}
