//! Agent orchestration.
//!
//! Wires the watchlist engine, the decision loop and the access key
//! refresher to the shared state, and runs each on its own task:
//! - watchlist cycle: waits on the refresh scheduler (regular cadence or
//!   post-liquidation quarantine)
//! - decision cycle: fixed tick, a tick never overlaps the previous one
//! - access key cycle: re-reads nonce and block hash

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use liquidator_chain::{AccessKeySource, BroadcastHandle, LendingProtocol, TransactionSigner};

use crate::config::BotConfig;
use crate::engine::WatchlistEngine;
use crate::liquidator::Liquidator;
use crate::oracle::RatioOracle;
use crate::state::AgentState;
use crate::status::StatusRecorder;

/// Everything the agent talks to outside the process.
pub struct AgentDeps {
    pub protocol: Arc<dyn LendingProtocol>,
    pub signer: Arc<TransactionSigner>,
    pub access_keys: Arc<dyn AccessKeySource>,
    pub broadcaster: BroadcastHandle,
    pub status: Arc<dyn StatusRecorder>,
}

pub struct Agent {
    config: BotConfig,
    state: Arc<AgentState>,
    engine: WatchlistEngine,
    liquidator: Liquidator,
    signer: Arc<TransactionSigner>,
    access_keys: Arc<dyn AccessKeySource>,
}

/// Join handles of the spawned cycles.
pub struct AgentTasks {
    pub watchlist: JoinHandle<()>,
    pub decision: JoinHandle<()>,
    pub access_key: JoinHandle<()>,
}

impl AgentTasks {
    pub fn abort(&self) {
        self.watchlist.abort();
        self.decision.abort();
        self.access_key.abort();
    }
}

impl Agent {
    pub fn new(config: BotConfig, deps: AgentDeps) -> Self {
        let state = Arc::new(AgentState::new(&config));
        let oracle = RatioOracle::new(
            deps.protocol,
            config.watchlist.read_timeout(),
            config.watchlist.max_concurrent_reads,
        );

        let engine = WatchlistEngine::new(
            oracle.clone(),
            state.clone(),
            deps.status.clone(),
            config.watchlist.size,
        );
        let liquidator = Liquidator::new(
            oracle,
            state.clone(),
            deps.signer.clone(),
            deps.broadcaster,
            deps.status,
        );

        Self {
            config,
            state,
            engine,
            liquidator,
            signer: deps.signer,
            access_keys: deps.access_keys,
        }
    }

    pub fn state(&self) -> &Arc<AgentState> {
        &self.state
    }

    /// Spawn the three periodic cycles.
    pub fn spawn(self: Arc<Self>) -> AgentTasks {
        info!(
            contract = %self.liquidator.contract_id(),
            signer = %self.signer.signer_id(),
            "Starting agent cycles"
        );

        let watchlist_agent = self.clone();
        let watchlist = tokio::spawn(async move {
            watchlist_agent.watchlist_cycle().await;
        });

        let decision_agent = self.clone();
        let decision = tokio::spawn(async move {
            decision_agent.decision_cycle().await;
        });

        let access_key_agent = self;
        let access_key = tokio::spawn(async move {
            access_key_agent.access_key_cycle().await;
        });

        AgentTasks {
            watchlist,
            decision,
            access_key,
        }
    }

    /// Run one watchlist refresh now.
    pub async fn refresh_watchlist(&self) {
        let scheduler = self.state.scheduler();
        let previous = scheduler.fire(Instant::now());
        if previous.is_quarantined() {
            info!("Running deferred post-liquidation refresh");
        }
        if let Err(e) = self.engine.refresh().await {
            warn!(error = %e, "Watchlist refresh failed");
        }
    }

    /// Run one decision pass now.
    pub async fn decide(&self) {
        self.liquidator.tick().await;
    }

    /// Re-read nonce and block hash now.
    #[instrument(skip(self), fields(signer = %self.signer.signer_id()))]
    pub async fn refresh_access_key(&self) {
        match self.signer.refresh_access_key(self.access_keys.as_ref()).await {
            Ok(view) => info!(
                chain_nonce = view.nonce,
                nonce = self.signer.current_nonce(),
                block_height = view.block_height,
                "Access key refreshed"
            ),
            Err(e) => error!(error = %e, "Access key refresh failed"),
        }
    }

    // Background cycles

    async fn watchlist_cycle(&self) {
        loop {
            self.state.scheduler().wait_due().await;
            self.refresh_watchlist().await;
        }
    }

    async fn decision_cycle(&self) {
        let mut ticker = tokio::time::interval(self.config.decision.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.decide().await;
        }
    }

    async fn access_key_cycle(&self) {
        // Seeded at startup, so the first refresh waits a full period
        let period = self.config.access_key.refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh_access_key().await;
        }
    }
}
