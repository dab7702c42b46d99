//! NEAR transaction envelope and its canonical Borsh encoding.
//!
//! Signing a transaction is three steps: Borsh-serialize the envelope,
//! SHA-256 the bytes (this digest is also the transaction hash), and sign the
//! digest with the sender's key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Write};

use crate::error::RpcError;
use crate::keys::{KeyPair, PublicKey, Signature};

/// Borsh variant index of `FunctionCall` in the chain's `Action` enum.
pub const FUNCTION_CALL_ACTION_TAG: u8 = 2;

/// 32-byte SHA-256 digest (block hashes and transaction hashes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, BorshSerialize)]
pub struct CryptoHash(pub [u8; 32]);

impl CryptoHash {
    pub fn hash_bytes(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Parse the base58 form returned by the RPC.
    pub fn from_base58(s: &str) -> Result<Self, RpcError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| RpcError::Decode(format!("invalid base58 hash '{}': {}", s, e)))?;
        let data = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| RpcError::Decode(format!("hash '{}' is {} bytes", s, bytes.len())))?;
        Ok(Self(data))
    }
}

impl fmt::Display for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for CryptoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({})", self)
    }
}

/// Contract method invocation.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    /// JSON-encoded arguments
    pub args: Vec<u8>,
    /// Attached gas
    pub gas: u64,
    /// Attached deposit in yoctoNEAR
    pub deposit: u128,
}

/// Transaction action. Only function calls are ever built by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FunctionCall(FunctionCallAction),
}

impl Action {
    pub fn function_call(
        method_name: impl Into<String>,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    ) -> Self {
        Action::FunctionCall(FunctionCallAction {
            method_name: method_name.into(),
            args,
            gas,
            deposit,
        })
    }
}

impl BorshSerialize for Action {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall(call) => {
                writer.write_all(&[FUNCTION_CALL_ACTION_TAG])?;
                call.serialize(writer)
            }
        }
    }
}

/// Unsigned transaction envelope. Field order is the wire order.
#[derive(Debug, Clone, BorshSerialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: CryptoHash,
    pub actions: Vec<Action>,
}

impl Transaction {
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    /// SHA-256 of the Borsh bytes.
    pub fn hash(&self) -> io::Result<CryptoHash> {
        Ok(CryptoHash::hash_bytes(&self.to_bytes()?))
    }

    /// Serialize, hash, and sign.
    pub fn sign(self, key_pair: &KeyPair) -> io::Result<SignedTransaction> {
        let hash = self.hash()?;
        let signature = key_pair.sign(&hash.0);
        Ok(SignedTransaction {
            transaction: self,
            signature,
            hash,
        })
    }
}

/// Transaction plus its signature, ready for broadcast.
#[derive(Debug, Clone, BorshSerialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
    #[borsh(skip)]
    hash: CryptoHash,
}

impl SignedTransaction {
    /// Hash the network will report for this transaction.
    pub fn hash(&self) -> CryptoHash {
        self.hash
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    /// Base64 of the Borsh bytes, as expected by `broadcast_tx_*`.
    pub fn to_base64(&self) -> io::Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    const GAS: u64 = 300_000_000_000_000;

    fn key_pair() -> KeyPair {
        KeyPair::from_signing_key(SigningKey::from_bytes(&[11u8; 32]))
    }

    fn push_string(out: &mut Vec<u8>, s: &[u8]) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s);
    }

    fn sample_transaction(key: &KeyPair) -> Transaction {
        Transaction {
            signer_id: "bot.near".to_string(),
            public_key: *key.public_key(),
            nonce: 42,
            receiver_id: "v3.oin_finance.near".to_string(),
            block_hash: CryptoHash([3u8; 32]),
            actions: vec![Action::function_call(
                "liquidation",
                br#"{"account":"alice.near"}"#.to_vec(),
                GAS,
                0,
            )],
        }
    }

    #[test]
    fn test_transaction_borsh_layout() {
        let key = key_pair();
        let tx = sample_transaction(&key);

        let mut expected = Vec::new();
        push_string(&mut expected, b"bot.near");
        expected.push(0); // ed25519
        expected.extend_from_slice(key.public_key().as_bytes());
        expected.extend_from_slice(&42u64.to_le_bytes());
        push_string(&mut expected, b"v3.oin_finance.near");
        expected.extend_from_slice(&[3u8; 32]);
        expected.extend_from_slice(&1u32.to_le_bytes()); // one action
        expected.push(FUNCTION_CALL_ACTION_TAG);
        push_string(&mut expected, b"liquidation");
        push_string(&mut expected, br#"{"account":"alice.near"}"#);
        expected.extend_from_slice(&GAS.to_le_bytes());
        expected.extend_from_slice(&0u128.to_le_bytes());

        assert_eq!(tx.to_bytes().unwrap(), expected);

        assert_eq!(tx.hash().unwrap(), CryptoHash::hash_bytes(&expected));
    }

    #[test]
    fn test_signed_transaction_encoding() {
        let key = key_pair();
        let tx = sample_transaction(&key);
        let unsigned = tx.to_bytes().unwrap();

        let signed = tx.sign(&key).unwrap();
        assert_eq!(signed.hash(), CryptoHash::hash_bytes(&unsigned));
        assert!(key.verify(&signed.hash().0, &signed.signature));

        let mut expected = unsigned.clone();
        expected.push(0); // ed25519 signature tag
        expected.extend_from_slice(signed.signature.as_bytes());
        assert_eq!(signed.to_bytes().unwrap(), expected);

        let decoded = STANDARD.decode(signed.to_base64().unwrap()).unwrap();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_crypto_hash_base58() {
        let hash = CryptoHash([5u8; 32]);
        let parsed = CryptoHash::from_base58(&hash.to_string()).unwrap();
        assert_eq!(parsed, hash);

        assert!(CryptoHash::from_base58("not-base58!").is_err());
        assert!(CryptoHash::from_base58(&bs58::encode([1u8; 8]).into_string()).is_err());
    }
}
