//! Error types for the chain interaction layer.

use thiserror::Error;

/// Errors returned by the NEAR JSON-RPC client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP transport failure (connect, timeout, non-JSON body).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code} ({name}): {message}")]
    Server {
        code: i64,
        name: String,
        message: String,
        data: Option<String>,
    },

    /// A `query` succeeded at the RPC level but the query itself failed
    /// (contract panic, unknown access key, ...).
    #[error("query failed: {0}")]
    Query(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Local Borsh serialization failure.
    #[error("encoding error: {0}")]
    Encode(#[from] std::io::Error),
}

/// Errors raised while loading or parsing signing keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse key file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported key type '{0}' (only ed25519 is supported)")]
    UnsupportedKeyType(String),

    #[error("invalid base58 key data: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("invalid key length {actual}, expected {expected}")]
    Length { expected: &'static str, actual: usize },

    #[error("invalid ed25519 key: {0}")]
    Ed25519(#[from] ed25519_dalek::SignatureError),

    #[error("public key {stored} does not match the secret key (derived {derived})")]
    Mismatch { stored: String, derived: String },
}

/// Errors raised when handing a signed transaction to the broadcaster.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("broadcaster has shut down")]
    Closed,
}
