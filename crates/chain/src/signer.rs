//! Transaction signer for liquidations.
//!
//! Owns the agent's signing context: account id, key pair, cached nonce and
//! a recent block hash. Both caches are seeded from the access key query at
//! startup and refreshed on a slow timer.
//!
//! OPTIMIZATIONS:
//! - Cached nonce: atomic counter avoids an RPC call per transaction
//! - Cached block hash: signing never waits on the network

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::contracts::{account_args, methods};
use crate::error::RpcError;
use crate::keys::{KeyPair, PublicKey};
use crate::rpc::{AccessKeySource, AccessKeyView};
use crate::transaction::{Action, CryptoHash, SignedTransaction, Transaction};

/// Gas attached to every liquidation call (300 TGas).
pub const DEFAULT_LIQUIDATION_GAS: u64 = 300_000_000_000_000;

/// Cached nonce manager.
/// The chain reports the nonce of the last transaction signed with the key;
/// every new transaction uses the next value.
pub struct NonceManager {
    /// Nonce of the most recently signed transaction
    current: AtomicU64,
}

impl NonceManager {
    /// Create from the nonce reported by the chain.
    pub fn new(chain_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(chain_nonce),
        }
    }

    /// Increment and return the nonce for the next transaction.
    /// Lock-free; concurrent callers always get distinct values.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Nonce of the most recently signed transaction.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Sync with the chain. Only moves forward: transactions signed locally
    /// but not yet executed must not have their nonce handed out again.
    pub fn sync(&self, chain_nonce: u64) -> u64 {
        let previous = self.current.fetch_max(chain_nonce, Ordering::SeqCst);
        previous.max(chain_nonce)
    }
}

/// Builds and signs transactions on behalf of the agent account.
pub struct TransactionSigner {
    signer_id: String,
    key_pair: KeyPair,
    nonce: NonceManager,
    block_hash: RwLock<CryptoHash>,
    gas: u64,
}

impl TransactionSigner {
    /// Create from an already fetched access key view.
    pub fn new(signer_id: impl Into<String>, key_pair: KeyPair, access_key: &AccessKeyView) -> Self {
        Self {
            signer_id: signer_id.into(),
            key_pair,
            nonce: NonceManager::new(access_key.nonce),
            block_hash: RwLock::new(access_key.block_hash),
            gas: DEFAULT_LIQUIDATION_GAS,
        }
    }

    /// Fetch the access key and create the signer.
    pub async fn connect(
        signer_id: impl Into<String>,
        key_pair: KeyPair,
        source: &dyn AccessKeySource,
    ) -> Result<Self> {
        let signer_id = signer_id.into();
        let access_key = source
            .view_access_key(&signer_id, key_pair.public_key())
            .await
            .with_context(|| {
                format!(
                    "failed to fetch access key {} for {}",
                    key_pair.public_key(),
                    signer_id
                )
            })?;

        info!(
            signer = %signer_id,
            public_key = %key_pair.public_key(),
            nonce = access_key.nonce,
            block_height = access_key.block_height,
            "Transaction signer initialized"
        );

        Ok(Self::new(signer_id, key_pair, &access_key))
    }

    /// Set the gas attached to liquidation calls.
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn signer_id(&self) -> &str {
        &self.signer_id
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    pub fn current_nonce(&self) -> u64 {
        self.nonce.current()
    }

    pub fn block_hash(&self) -> CryptoHash {
        *self.block_hash.read()
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    /// Build and sign a single function call transaction.
    /// The nonce is consumed before the transaction is built.
    pub fn sign_function_call(
        &self,
        receiver_id: &str,
        method_name: &str,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    ) -> Result<SignedTransaction> {
        let nonce = self.nonce.next();
        let block_hash = self.block_hash();

        let transaction = Transaction {
            signer_id: self.signer_id.clone(),
            public_key: *self.key_pair.public_key(),
            nonce,
            receiver_id: receiver_id.to_string(),
            block_hash,
            actions: vec![Action::function_call(method_name, args, gas, deposit)],
        };

        let signed = transaction
            .sign(&self.key_pair)
            .context("failed to serialize transaction")?;

        debug!(
            receiver = receiver_id,
            method = method_name,
            nonce,
            block_hash = %block_hash,
            tx_hash = %signed.hash(),
            "Transaction signed"
        );
        Ok(signed)
    }

    /// Build and sign `liquidation({account})` against the lending contract,
    /// with the configured gas and no deposit.
    pub fn sign_liquidation(&self, contract_id: &str, account: &str) -> Result<SignedTransaction> {
        let args = serde_json::to_vec(&account_args(account))?;
        self.sign_function_call(contract_id, methods::LIQUIDATION, args, self.gas, 0)
    }

    /// Apply a freshly read access key view.
    pub fn apply_access_key(&self, view: &AccessKeyView) {
        let nonce = self.nonce.sync(view.nonce);
        *self.block_hash.write() = view.block_hash;
        debug!(
            chain_nonce = view.nonce,
            nonce,
            block_height = view.block_height,
            block_hash = %view.block_hash,
            "Access key info refreshed"
        );
    }

    /// Re-read nonce and block hash from the chain.
    pub async fn refresh_access_key(
        &self,
        source: &dyn AccessKeySource,
    ) -> Result<AccessKeyView, RpcError> {
        let view = source
            .view_access_key(&self.signer_id, self.key_pair.public_key())
            .await?;
        self.apply_access_key(&view);
        Ok(view)
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("signer_id", &self.signer_id)
            .field("public_key", self.key_pair.public_key())
            .field("nonce", &self.nonce.current())
            .field("gas", &self.gas)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ed25519_dalek::SigningKey;
    use parking_lot::Mutex;

    struct MockAccessKeys {
        view: Mutex<AccessKeyView>,
    }

    #[async_trait]
    impl AccessKeySource for MockAccessKeys {
        async fn view_access_key(
            &self,
            _account_id: &str,
            _public_key: &PublicKey,
        ) -> Result<AccessKeyView, RpcError> {
            Ok(self.view.lock().clone())
        }
    }

    fn view(nonce: u64, hash_byte: u8) -> AccessKeyView {
        AccessKeyView {
            nonce,
            block_hash: CryptoHash([hash_byte; 32]),
            block_height: 100,
        }
    }

    fn signer(nonce: u64) -> TransactionSigner {
        let key = KeyPair::from_signing_key(SigningKey::from_bytes(&[1u8; 32]));
        TransactionSigner::new("bot.near", key, &view(nonce, 1))
    }

    #[test]
    fn test_nonce_manager() {
        let manager = NonceManager::new(10);

        assert_eq!(manager.current(), 10);
        assert_eq!(manager.next(), 11);
        assert_eq!(manager.current(), 11);
        assert_eq!(manager.next(), 12);

        // Sync moves forward when the chain is ahead
        assert_eq!(manager.sync(15), 15);
        assert_eq!(manager.next(), 16);

        // Sync never moves back
        assert_eq!(manager.sync(10), 16);
        assert_eq!(manager.current(), 16);
    }

    #[test]
    fn test_concurrent_nonces_are_unique() {
        let manager = std::sync::Arc::new(NonceManager::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || (0..100).map(|_| manager.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&800));
    }

    #[test]
    fn test_sign_liquidation() {
        let signer = signer(41);
        let signed = signer
            .sign_liquidation("v3.oin_finance.near", "alice.near")
            .unwrap();

        let tx = &signed.transaction;
        assert_eq!(tx.signer_id, "bot.near");
        assert_eq!(tx.receiver_id, "v3.oin_finance.near");
        assert_eq!(tx.nonce, 42);
        assert_eq!(tx.block_hash, CryptoHash([1u8; 32]));
        assert_eq!(
            tx.actions,
            vec![Action::function_call(
                "liquidation",
                br#"{"account":"alice.near"}"#.to_vec(),
                DEFAULT_LIQUIDATION_GAS,
                0,
            )]
        );
        assert_eq!(signer.current_nonce(), 42);
    }

    #[test]
    fn test_each_transaction_gets_next_nonce() {
        let signer = signer(7);
        let nonces: Vec<u64> = (0..3)
            .map(|i| {
                signer
                    .sign_liquidation("lending.near", &format!("user{}.near", i))
                    .unwrap()
                    .transaction
                    .nonce
            })
            .collect();
        assert_eq!(nonces, vec![8, 9, 10]);
    }

    #[test]
    fn test_custom_gas() {
        let signer = signer(0).with_gas(100_000_000_000_000);
        let signed = signer.sign_liquidation("lending.near", "bob.near").unwrap();
        match &signed.transaction.actions[0] {
            Action::FunctionCall(call) => assert_eq!(call.gas, 100_000_000_000_000),
        }
    }

    #[tokio::test]
    async fn test_refresh_access_key() {
        let signer = signer(5);
        let source = MockAccessKeys {
            view: Mutex::new(view(20, 2)),
        };

        signer.refresh_access_key(&source).await.unwrap();
        assert_eq!(signer.current_nonce(), 20);
        assert_eq!(signer.block_hash(), CryptoHash([2u8; 32]));

        // Local transactions not yet seen by the node keep the nonce ahead
        signer.sign_liquidation("lending.near", "a.near").unwrap();
        *source.view.lock() = view(20, 3);
        signer.refresh_access_key(&source).await.unwrap();
        assert_eq!(signer.current_nonce(), 21);
        assert_eq!(signer.block_hash(), CryptoHash([3u8; 32]));

        let next = signer.sign_liquidation("lending.near", "b.near").unwrap();
        assert_eq!(next.transaction.nonce, 22);
        assert_eq!(next.transaction.block_hash, CryptoHash([3u8; 32]));
    }

    #[tokio::test]
    async fn test_connect_seeds_from_chain() {
        let key = KeyPair::from_signing_key(SigningKey::from_bytes(&[2u8; 32]));
        let source = MockAccessKeys {
            view: Mutex::new(view(99, 4)),
        };
        let signer = TransactionSigner::connect("bot.near", key, &source)
            .await
            .unwrap();
        assert_eq!(signer.current_nonce(), 99);
        assert_eq!(signer.block_hash(), CryptoHash([4u8; 32]));
        assert_eq!(signer.gas(), DEFAULT_LIQUIDATION_GAS);
    }
}
