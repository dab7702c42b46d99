//! ed25519 key handling and the file-system key store.
//!
//! Keys are written the NEAR way: `ed25519:<base58>`. Secret keys decode to
//! 64 bytes (seed followed by public key) or to a bare 32-byte seed.
//!
//! The key store follows the NEAR CLI credentials layout:
//! `<root>/<network_id>/<account_id>.json`.

use borsh::BorshSerialize;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::Deserialize;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::KeyError;

/// Signature scheme tag, serialized as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            KeyType::Ed25519 => 0,
        }
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            other => Err(KeyError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl BorshSerialize for KeyType {
    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&[self.tag()])
    }
}

/// Split `ed25519:<base58>` into its key type and decoded bytes.
/// A string without a prefix is treated as ed25519.
fn decode_key_string(s: &str) -> Result<(KeyType, Vec<u8>), KeyError> {
    let (key_type, data) = match s.split_once(':') {
        Some((prefix, data)) => (prefix.parse()?, data),
        None => (KeyType::Ed25519, s),
    };
    let bytes = bs58::decode(data.trim()).into_vec()?;
    Ok((key_type, bytes))
}

/// Public key as carried in a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize)]
pub struct PublicKey {
    key_type: KeyType,
    data: [u8; 32],
}

impl PublicKey {
    pub fn ed25519(data: [u8; 32]) -> Self {
        Self {
            key_type: KeyType::Ed25519,
            data,
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.data
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.key_type.as_str(),
            bs58::encode(self.data).into_string()
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, bytes) = decode_key_string(s)?;
        let data = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| KeyError::Length {
            expected: "32",
            actual: bytes.len(),
        })?;
        Ok(Self { key_type, data })
    }
}

/// Detached signature as carried in a signed transaction.
#[derive(Clone, PartialEq, Eq, BorshSerialize)]
pub struct Signature {
    key_type: KeyType,
    data: [u8; 64],
}

impl Signature {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.data
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({}:{})",
            self.key_type.as_str(),
            bs58::encode(self.data).into_string()
        )
    }
}

/// The agent's signing key together with its public half.
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Parse a secret key string (`ed25519:<base58>`).
    pub fn from_secret_key(secret: &str) -> Result<Self, KeyError> {
        let (_, bytes) = decode_key_string(secret)?;

        let signing_key = match bytes.len() {
            64 => {
                let keypair = <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| {
                    KeyError::Length {
                        expected: "64",
                        actual: bytes.len(),
                    }
                })?;
                SigningKey::from_keypair_bytes(&keypair)?
            }
            32 => {
                let seed = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
                    KeyError::Length {
                        expected: "32",
                        actual: bytes.len(),
                    }
                })?;
                SigningKey::from_bytes(&seed)
            }
            actual => {
                return Err(KeyError::Length {
                    expected: "32 or 64",
                    actual,
                })
            }
        };

        Ok(Self::from_signing_key(signing_key))
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::ed25519(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign an arbitrary message (for transactions: the SHA-256 digest).
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            key_type: KeyType::Ed25519,
            data: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Check a signature against this key's public half.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let verifying_key: VerifyingKey = self.signing_key.verifying_key();
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        verifying_key.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// On-disk key file written by the NEAR CLI (or a validator key file).
#[derive(Debug, Deserialize)]
struct KeyFile {
    account_id: String,
    public_key: String,
    #[serde(alias = "secret_key")]
    private_key: String,
}

/// Load a single key file and return the account it belongs to.
pub fn load_key_file(path: impl AsRef<Path>) -> Result<(String, KeyPair), KeyError> {
    let path = path.as_ref();
    let shown_path = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: shown_path.clone(),
        source,
    })?;
    let file: KeyFile = serde_json::from_str(&content).map_err(|source| KeyError::Json {
        path: shown_path.clone(),
        source,
    })?;

    let key_pair = KeyPair::from_secret_key(&file.private_key)?;
    let stored: PublicKey = file.public_key.parse()?;
    if &stored != key_pair.public_key() {
        return Err(KeyError::Mismatch {
            stored: stored.to_string(),
            derived: key_pair.public_key().to_string(),
        });
    }

    debug!(path = %shown_path, account = %file.account_id, public_key = %stored, "Key file loaded");
    Ok((file.account_id, key_pair))
}

/// Unencrypted file-system key store.
#[derive(Debug, Clone)]
pub struct KeyStore {
    root: PathBuf,
}

impl KeyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the key for `account_id` on `network_id`.
    pub fn key_path(&self, network_id: &str, account_id: &str) -> PathBuf {
        self.root
            .join(network_id)
            .join(format!("{}.json", account_id))
    }

    /// Load the key for `account_id` on `network_id`.
    pub fn get_key(&self, network_id: &str, account_id: &str) -> Result<KeyPair, KeyError> {
        let (_, key_pair) = load_key_file(self.key_path(network_id, account_id))?;
        Ok(key_pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn secret_string(key: &SigningKey) -> String {
        format!("ed25519:{}", bs58::encode(key.to_keypair_bytes()).into_string())
    }

    #[test]
    fn test_public_key_display_and_parse() {
        let key = KeyPair::from_signing_key(test_signing_key());
        let text = key.public_key().to_string();
        assert!(text.starts_with("ed25519:"));

        let parsed: PublicKey = text.parse().unwrap();
        assert_eq!(&parsed, key.public_key());
    }

    #[test]
    fn test_secret_key_formats() {
        let signing_key = test_signing_key();
        let full = KeyPair::from_secret_key(&secret_string(&signing_key)).unwrap();

        let seed_only = format!("ed25519:{}", bs58::encode(signing_key.to_bytes()).into_string());
        let from_seed = KeyPair::from_secret_key(&seed_only).unwrap();

        assert_eq!(full.public_key(), from_seed.public_key());
    }

    #[test]
    fn test_rejects_unknown_key_type() {
        let err = KeyPair::from_secret_key("secp256k1:abc").unwrap_err();
        assert!(matches!(err, KeyError::UnsupportedKeyType(_)));
    }

    #[test]
    fn test_rejects_bad_length() {
        let short = format!("ed25519:{}", bs58::encode([1u8; 16]).into_string());
        let err = KeyPair::from_secret_key(&short).unwrap_err();
        assert!(matches!(err, KeyError::Length { actual: 16, .. }));
    }

    #[test]
    fn test_sign_and_verify() {
        let key = KeyPair::from_signing_key(test_signing_key());
        let signature = key.sign(b"liquidation");
        assert!(key.verify(b"liquidation", &signature));
        assert!(!key.verify(b"other message", &signature));
    }

    #[test]
    fn test_key_store_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let signing_key = test_signing_key();
        let key = KeyPair::from_signing_key(signing_key.clone());

        let path = store.key_path("testnet", "bot.testnet");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let json = serde_json::json!({
            "account_id": "bot.testnet",
            "public_key": key.public_key().to_string(),
            "private_key": secret_string(&signing_key),
        });
        std::fs::write(&path, json.to_string()).unwrap();

        let loaded = store.get_key("testnet", "bot.testnet").unwrap();
        assert_eq!(loaded.public_key(), key.public_key());

        assert!(store.get_key("mainnet", "bot.testnet").is_err());
    }

    #[test]
    fn test_validator_key_file_with_secret_key_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator_key.json");
        let signing_key = test_signing_key();
        let key = KeyPair::from_signing_key(signing_key.clone());

        let json = serde_json::json!({
            "account_id": "test.near",
            "public_key": key.public_key().to_string(),
            "secret_key": secret_string(&signing_key),
        });
        std::fs::write(&path, json.to_string()).unwrap();

        let (account, loaded) = load_key_file(&path).unwrap();
        assert_eq!(account, "test.near");
        assert_eq!(loaded.public_key(), key.public_key());
    }

    #[test]
    fn test_key_file_public_key_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        let other = KeyPair::from_signing_key(SigningKey::from_bytes(&[9u8; 32]));

        let json = serde_json::json!({
            "account_id": "bot.testnet",
            "public_key": other.public_key().to_string(),
            "private_key": secret_string(&test_signing_key()),
        });
        std::fs::write(&path, json.to_string()).unwrap();

        let err = load_key_file(&path).unwrap_err();
        assert!(matches!(err, KeyError::Mismatch { .. }));
    }
}
