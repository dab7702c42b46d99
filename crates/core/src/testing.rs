//! In-memory collaborators shared by the unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use liquidator_chain::{
    AccessKeySource, AccessKeyView, CryptoHash, KeyPair, LendingProtocol, PublicKey, RpcError,
    SignedTransaction, TransactionSigner, TransactionSubmitter,
};

/// Lending contract whose state the test controls.
#[derive(Debug, Default)]
pub struct MockProtocol {
    line: Mutex<u128>,
    ratios: Mutex<HashMap<String, u128>>,
    candidates: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    pub ratio_reads: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl MockProtocol {
    pub fn new(line: u128) -> Self {
        Self {
            line: Mutex::new(line),
            ..Default::default()
        }
    }

    pub fn set_line(&self, line: u128) {
        *self.line.lock() = line;
    }

    /// Set an account's ratio, adding it to the candidate list if new.
    pub fn set_ratio(&self, account: &str, ratio: u128) {
        self.ratios.lock().insert(account.to_string(), ratio);
        let mut candidates = self.candidates.lock();
        if !candidates.iter().any(|c| c == account) {
            candidates.push(account.to_string());
        }
    }

    pub fn set_candidates(&self, accounts: &[&str]) {
        *self.candidates.lock() = accounts.iter().map(|a| a.to_string()).collect();
    }

    pub fn set_delay(&self, account: &str, delay: Duration) {
        self.delays.lock().insert(account.to_string(), delay);
    }

    pub fn set_failing(&self, account: &str) {
        self.failing.lock().insert(account.to_string());
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.fail_listing.store(fails, Ordering::SeqCst);
    }
}

#[async_trait]
impl LendingProtocol for MockProtocol {
    fn contract_id(&self) -> &str {
        "lending.test.near"
    }

    async fn get_user_ratio(&self, account: &str) -> Result<u128> {
        self.ratio_reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().get(account).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(account) {
            return Err(anyhow!("view call failed for {}", account));
        }
        Ok(self.ratios.lock().get(account).copied().unwrap_or(0))
    }

    async fn list_liquidatable_accounts(&self) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(anyhow!("list_liqutations unavailable"));
        }
        Ok(self.candidates.lock().clone())
    }

    async fn get_liquidation_line(&self) -> Result<u128> {
        Ok(*self.line.lock())
    }
}

/// Submitter that records every transaction it sees.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    pub submitted: Mutex<Vec<SignedTransaction>>,
}

#[async_trait]
impl TransactionSubmitter for RecordingSubmitter {
    async fn submit(&self, signed: &SignedTransaction) -> Result<String, RpcError> {
        self.submitted.lock().push(signed.clone());
        Ok(signed.hash().to_string())
    }
}

/// Access key source returning a fixed view.
#[derive(Debug)]
pub struct FixedAccessKey(pub Mutex<AccessKeyView>);

#[async_trait]
impl AccessKeySource for FixedAccessKey {
    async fn view_access_key(
        &self,
        _account_id: &str,
        _public_key: &PublicKey,
    ) -> Result<AccessKeyView, RpcError> {
        Ok(self.0.lock().clone())
    }
}

pub fn access_key(nonce: u64) -> AccessKeyView {
    AccessKeyView {
        nonce,
        block_hash: CryptoHash([7u8; 32]),
        block_height: 1_000,
    }
}

pub fn signer(nonce: u64) -> TransactionSigner {
    let key = KeyPair::from_signing_key(ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]));
    TransactionSigner::new("liquidator.test.near", key, &access_key(nonce))
}
