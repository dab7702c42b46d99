//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - A NEAR JSON-RPC client (status, view calls, access keys, async broadcast)
//! - The lending contract binding behind the `LendingProtocol` trait
//! - ed25519 keys and the file-system key store
//! - Canonical Borsh transaction encoding, hashing and signing
//! - The transaction signer with its cached nonce and block hash
//! - A bounded broadcast queue for fire-and-forget submission

mod broadcaster;
mod contracts;
mod error;
mod keys;
mod protocol;
mod rpc;
mod signer;
pub mod transaction;

pub use broadcaster::{
    BroadcastHandle, BroadcastStats, Broadcaster, OutboundTransaction, TransactionSubmitter,
    DEFAULT_QUEUE_CAPACITY,
};
pub use contracts::{account_args, methods, parse_u128, LendingContract};
pub use error::{BroadcastError, KeyError, RpcError};
pub use keys::{load_key_file, KeyPair, KeyStore, KeyType, PublicKey, Signature};
pub use protocol::LendingProtocol;
pub use rpc::{AccessKeySource, AccessKeyView, Finality, NearRpcClient, NodeStatus, SyncInfo};
pub use signer::{NonceManager, TransactionSigner, DEFAULT_LIQUIDATION_GAS};
pub use transaction::{Action, CryptoHash, FunctionCallAction, SignedTransaction, Transaction};
