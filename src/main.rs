//! NEAR Lending Liquidation Agent
//!
//! Watches the accounts of a NEAR lending contract that are closest to
//! their liquidation line and liquidates them as soon as they cross it.
//! Features:
//! - Bounded watchlist of the worst-collateralized accounts
//! - Fast live-ratio polling with an in-tick double-liquidation guard
//! - Locally built and signed transactions with a cached nonce/block hash
//! - Fire-and-forget broadcast through a bounded queue

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_chain::{
    load_key_file, Broadcaster, KeyPair, KeyStore, LendingContract, LendingProtocol,
    NearRpcClient, TransactionSigner,
};
use liquidator_core::{
    config::validate_account_id, Agent, AgentDeps, BotConfig, JsonStatusFile, NetworkConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")
            }),
        )
        .init();

    // Use BOT_PROFILE env var to select: default, testing, aggressive, or file path
    let bot_config = BotConfig::from_env()?;
    bot_config.log_config();

    // Use NEAR_ENV to select the network (default: development)
    let network = NetworkConfig::from_env().context("invalid network configuration")?;
    network.log_config();

    // Initialize components
    let agent = initialize_components(bot_config, &network).await?;

    // Run cycles until interrupted
    let tasks = Arc::new(agent).spawn();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutdown requested, stopping agent");
    tasks.abort();
    Ok(())
}

async fn initialize_components(config: BotConfig, network: &NetworkConfig) -> Result<Agent> {
    info!("Initializing components...");

    // RPC client; an unreachable node is fatal
    let rpc = Arc::new(NearRpcClient::new(&network.node_url)?);
    let status = rpc
        .status()
        .await
        .with_context(|| format!("node {} is unreachable", network.node_url))?;
    if status.chain_id != network.network_id {
        warn!(
            expected = %network.network_id,
            actual = %status.chain_id,
            "Node reports a different chain id"
        );
    }
    info!(
        chain_id = %status.chain_id,
        block_height = status.sync_info.latest_block_height,
        syncing = status.sync_info.syncing,
        "Connected to NEAR node"
    );

    // Signing key
    let (account_id, key_pair) = load_signing_key(network)?;
    validate_account_id(&account_id)?;

    // Transaction signer, seeded from the access key
    let signer = Arc::new(
        TransactionSigner::connect(account_id, key_pair, rpc.as_ref())
            .await?
            .with_gas(config.transaction.gas),
    );

    // Broadcaster
    let (broadcaster, handle) =
        Broadcaster::new(rpc.clone(), config.transaction.broadcast_queue_size);
    broadcaster.spawn();

    // Lending contract
    let protocol: Arc<dyn LendingProtocol> =
        Arc::new(LendingContract::new(rpc.clone(), network.contract_id.clone()));
    info!(contract = %protocol.contract_id(), "Lending contract configured");

    // Status document (reset on every start)
    let status = Arc::new(JsonStatusFile::create(&config.status.path)?);
    info!(path = %status.path().display(), "Status document initialized");

    let agent = Agent::new(
        config,
        AgentDeps {
            protocol,
            signer,
            access_keys: rpc,
            broadcaster: handle,
            status,
        },
    );

    info!("All components initialized");
    Ok(agent)
}

/// Resolve the signer account and its key, from a key file when the network
/// names one, otherwise from the credentials directory.
fn load_signing_key(network: &NetworkConfig) -> Result<(String, KeyPair)> {
    if let Some(path) = &network.key_path {
        let (file_account, key_pair) = load_key_file(path)
            .with_context(|| format!("failed to load key file {}", path.display()))?;
        let account_id = network.account_id.clone().unwrap_or(file_account);
        info!(account = %account_id, path = %path.display(), "Signing key loaded from key file");
        return Ok((account_id, key_pair));
    }

    let account_id = network
        .account_id
        .clone()
        .context("no signer account configured")?;
    let store = KeyStore::new(&network.credentials_path);
    let key_pair = store
        .get_key(&network.network_id, &account_id)
        .with_context(|| {
            format!(
                "failed to load key from {}",
                store.key_path(&network.network_id, &account_id).display()
            )
        })?;
    info!(
        account = %account_id,
        public_key = %key_pair.public_key(),
        "Signing key loaded from credentials"
    );
    Ok((account_id, key_pair))
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔╗╔╔═╗╔═╗╦═╗  ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ║║║║╣ ╠═╣╠╦╝  ║  ││─┼┐│ ││ ││├─┤ │ │ │├┬┘
    ╝╚╝╚═╝╩ ╩╩╚═  ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ └─┘┴└─
    Lending Liquidation Agent v0.1.0
    "#
    );
}
