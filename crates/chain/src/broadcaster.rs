//! Outbound transaction queue.
//!
//! The decision loop hands signed transactions to a bounded queue and moves
//! on. A single broadcaster task drains the queue and submits each
//! transaction in enqueue order, so nonces reach the node in increasing
//! order. Rejections are logged here and never retried.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{BroadcastError, RpcError};
use crate::rpc::NearRpcClient;
use crate::transaction::{CryptoHash, SignedTransaction};

/// Default number of signed transactions that may wait for submission.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Anything that can put a signed transaction on the network.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit without waiting for execution; returns the node-reported hash.
    async fn submit(&self, signed: &SignedTransaction) -> Result<String, RpcError>;
}

#[async_trait]
impl TransactionSubmitter for NearRpcClient {
    async fn submit(&self, signed: &SignedTransaction) -> Result<String, RpcError> {
        self.broadcast_tx_async(signed).await
    }
}

/// A queued transaction and the account it liquidates.
#[derive(Debug)]
pub struct OutboundTransaction {
    pub target: String,
    pub signed: SignedTransaction,
    pub queued_at: Instant,
}

/// Submission counters shared between the handle and the task.
#[derive(Debug, Default)]
pub struct BroadcastStats {
    pub submitted: AtomicU64,
    pub failed: AtomicU64,
}

impl BroadcastStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Cheap, cloneable sending side of the queue.
#[derive(Debug, Clone)]
pub struct BroadcastHandle {
    sender: mpsc::Sender<OutboundTransaction>,
    capacity: usize,
    stats: Arc<BroadcastStats>,
}

impl BroadcastHandle {
    /// Queue a signed transaction. Never blocks.
    pub fn enqueue(
        &self,
        target: &str,
        signed: SignedTransaction,
    ) -> Result<CryptoHash, BroadcastError> {
        let hash = signed.hash();
        let job = OutboundTransaction {
            target: target.to_string(),
            signed,
            queued_at: Instant::now(),
        };

        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => BroadcastError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => BroadcastError::Closed,
        })?;
        Ok(hash)
    }

    /// Transactions waiting to be submitted.
    pub fn pending(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }
}

/// Receiving side: submits queued transactions one by one.
pub struct Broadcaster {
    submitter: Arc<dyn TransactionSubmitter>,
    receiver: mpsc::Receiver<OutboundTransaction>,
    stats: Arc<BroadcastStats>,
}

impl Broadcaster {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>, capacity: usize) -> (Self, BroadcastHandle) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let stats = Arc::new(BroadcastStats::default());

        let handle = BroadcastHandle {
            sender,
            capacity,
            stats: stats.clone(),
        };
        let broadcaster = Self {
            submitter,
            receiver,
            stats,
        };
        (broadcaster, handle)
    }

    /// Drain the queue until every handle is dropped.
    pub async fn run(mut self) {
        info!("Broadcaster started");
        while let Some(job) = self.receiver.recv().await {
            self.submit(job).await;
        }
        info!(
            submitted = self.stats.submitted(),
            failed = self.stats.failed(),
            "Broadcaster stopped"
        );
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn submit(&self, job: OutboundTransaction) {
        let local_hash = job.signed.hash();
        let nonce = job.signed.transaction.nonce;
        let submit_start = Instant::now();

        match self.submitter.submit(&job.signed).await {
            Ok(tx_hash) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                info!(
                    target_account = %job.target,
                    tx_hash = %tx_hash,
                    nonce,
                    queued_ms = submit_start.duration_since(job.queued_at).as_millis(),
                    submit_ms = submit_start.elapsed().as_millis(),
                    "Liquidation transaction submitted"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    target_account = %job.target,
                    tx_hash = %local_hash,
                    nonce,
                    error = %e,
                    "Liquidation transaction rejected"
                );
            }
        }
    }
}
