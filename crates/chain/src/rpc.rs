//! NEAR JSON-RPC client.
//! Thin typed wrapper over `reqwest` for the handful of methods the agent uses.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::keys::PublicKey;
use crate::transaction::{CryptoHash, SignedTransaction};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Block reference used for read queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finality {
    /// Latest block, possibly not yet final
    Optimistic,
    /// Latest final block
    Final,
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    cause: Option<Value>,
}

impl From<RpcErrorObject> for RpcError {
    fn from(e: RpcErrorObject) -> Self {
        let data = e.cause.or(e.data).map(|v| v.to_string());
        RpcError::Server {
            code: e.code,
            name: e.name.unwrap_or_else(|| "UNKNOWN".to_string()),
            message: e.message,
            data,
        }
    }
}

/// Result of a `call_function` query.
#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(default)]
    result: Vec<u8>,
    #[serde(default)]
    logs: Vec<String>,
    #[serde(default)]
    block_height: u64,
    /// Older nodes report query failures inside the result
    #[serde(default)]
    error: Option<String>,
}

/// Access key state for (account, public key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyView {
    /// Nonce of the last transaction signed with this key
    pub nonce: u64,
    /// Hash of the block the answer was read at
    pub block_hash: CryptoHash,
    pub block_height: u64,
}

#[derive(Debug, Deserialize)]
struct RawAccessKeyView {
    #[serde(default)]
    nonce: u64,
    #[serde(default)]
    block_hash: String,
    #[serde(default)]
    block_height: u64,
    #[serde(default)]
    error: Option<String>,
}

/// Node status used for the startup health check.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    pub chain_id: String,
    pub sync_info: SyncInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_hash: String,
    pub latest_block_height: u64,
    #[serde(default)]
    pub syncing: bool,
}

/// Source of access key information (nonce + recent block hash).
#[async_trait]
pub trait AccessKeySource: Send + Sync {
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, RpcError>;
}

/// JSON-RPC client for a single NEAR node.
#[derive(Debug, Clone)]
pub struct NearRpcClient {
    client: reqwest::Client,
    url: String,
}

impl NearRpcClient {
    /// Create a client with the default request timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method,
            params,
        };

        let response: RpcResponse<R> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(error.into());
        }
        response
            .result
            .ok_or_else(|| RpcError::Decode(format!("{}: response has neither result nor error", method)))
    }

    /// Node status; also verifies the endpoint is reachable.
    pub async fn status(&self) -> Result<NodeStatus, RpcError> {
        let status: NodeStatus = self.call("status", json!([])).await?;
        info!(
            url = %self.url,
            chain_id = %status.chain_id,
            block = status.sync_info.latest_block_height,
            syncing = status.sync_info.syncing,
            "RPC connection verified"
        );
        Ok(status)
    }

    /// Call a read-only contract method and return the raw result bytes.
    pub async fn view_function(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        finality: Finality,
    ) -> Result<Vec<u8>, RpcError> {
        let args_bytes = serde_json::to_vec(args)
            .map_err(|e| RpcError::Decode(format!("cannot encode args: {}", e)))?;

        let result: CallResult = self
            .call(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": finality,
                    "account_id": contract_id,
                    "method_name": method_name,
                    "args_base64": STANDARD.encode(args_bytes),
                }),
            )
            .await?;

        if let Some(error) = result.error {
            return Err(RpcError::Query(error));
        }

        debug!(
            contract = contract_id,
            method = method_name,
            block = result.block_height,
            logs = result.logs.len(),
            bytes = result.result.len(),
            "View call completed"
        );
        Ok(result.result)
    }

    /// Call a read-only contract method and decode its JSON result.
    pub async fn view_json<R: DeserializeOwned>(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        finality: Finality,
    ) -> Result<R, RpcError> {
        let bytes = self
            .view_function(contract_id, method_name, args, finality)
            .await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RpcError::Decode(format!("{}: {}", method_name, e)))
    }

    /// Submit a signed transaction without waiting for execution.
    /// Returns the transaction hash reported by the node.
    pub async fn broadcast_tx_async(&self, signed: &SignedTransaction) -> Result<String, RpcError> {
        let encoded = signed.to_base64()?;
        self.call("broadcast_tx_async", json!([encoded])).await
    }
}

#[async_trait]
impl AccessKeySource for NearRpcClient {
    async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, RpcError> {
        let raw: RawAccessKeyView = self
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": Finality::Final,
                    "account_id": account_id,
                    "public_key": public_key.to_string(),
                }),
            )
            .await?;

        if let Some(error) = raw.error {
            return Err(RpcError::Query(error));
        }

        Ok(AccessKeyView {
            nonce: raw.nonce,
            block_hash: CryptoHash::from_base58(&raw.block_hash)?,
            block_height: raw.block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method: "query",
            params: json!({ "finality": Finality::Optimistic }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "query");
        assert_eq!(value["params"]["finality"], "optimistic");
    }

    #[test]
    fn test_error_object_conversion() {
        let response: RpcResponse<Value> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"dontcare","error":{"code":-32000,"message":"Server error","name":"HANDLER_ERROR","cause":{"name":"UNKNOWN_ACCESS_KEY"}}}"#,
        )
        .unwrap();
        assert!(response.result.is_none());

        let err: RpcError = response.error.unwrap().into();
        match err {
            RpcError::Server { code, name, data, .. } => {
                assert_eq!(code, -32000);
                assert_eq!(name, "HANDLER_ERROR");
                assert!(data.unwrap().contains("UNKNOWN_ACCESS_KEY"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_call_result_decoding() {
        // `result` is the JSON return value as a byte array: "1500"
        let response: RpcResponse<CallResult> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"dontcare","result":{"result":[34,49,53,48,48,34],"logs":[],"block_height":10,"block_hash":"x"}}"#,
        )
        .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result.block_height, 10);
        let value: Value = serde_json::from_slice(&result.result).unwrap();
        assert_eq!(value, Value::String("1500".to_string()));
    }

    #[test]
    fn test_access_key_decoding() {
        let hash = CryptoHash([9u8; 32]);
        let body = format!(
            r#"{{"nonce":85,"permission":"FullAccess","block_height":19884918,"block_hash":"{}"}}"#,
            hash
        );
        let raw: RawAccessKeyView = serde_json::from_str(&body).unwrap();
        assert_eq!(raw.nonce, 85);
        assert_eq!(CryptoHash::from_base58(&raw.block_hash).unwrap(), hash);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_testnet_status() {
        let client = NearRpcClient::new("https://rpc.testnet.near.org").unwrap();
        let status = client.status().await.unwrap();
        assert_eq!(status.chain_id, "testnet");
        assert!(status.sync_info.latest_block_height > 0);
    }
}
