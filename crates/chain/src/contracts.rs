//! Lending contract binding over the NEAR RPC client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::trace;

use crate::protocol::LendingProtocol;
use crate::rpc::{Finality, NearRpcClient};

/// Contract method names.
pub mod methods {
    pub const GET_USER_RATIO: &str = "get_user_ratio";
    /// The deployed contract spells it this way.
    pub const LIST_LIQUIDATIONS: &str = "list_liqutations";
    pub const GET_LIQUIDATION_LINE: &str = "get_liquidation_line";
    pub const LIQUIDATION: &str = "liquidation";
}

/// Arguments for `get_user_ratio` and `liquidation`.
pub fn account_args(account: &str) -> Value {
    json!({ "account": account })
}

/// Contract integers come back either as JSON numbers or as decimal strings
/// (`U128` is serialized as a string).
pub fn parse_u128(value: &Value) -> Result<u128> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<u128>()
            .with_context(|| format!("invalid integer string '{}'", s)),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Ok(v as u128)
            } else {
                // Large numbers lose nothing through the textual form
                n.to_string()
                    .parse::<u128>()
                    .with_context(|| format!("integer {} is not an unsigned value", n))
            }
        }
        Value::Null => Ok(0),
        other => anyhow::bail!("expected an integer, got {}", other),
    }
}

/// Lending contract accessed through view calls.
#[derive(Debug, Clone)]
pub struct LendingContract {
    rpc: Arc<NearRpcClient>,
    contract_id: String,
}

impl LendingContract {
    pub fn new(rpc: Arc<NearRpcClient>, contract_id: impl Into<String>) -> Self {
        Self {
            rpc,
            contract_id: contract_id.into(),
        }
    }

    async fn view(&self, method: &str, args: &Value) -> Result<Value> {
        let value: Value = self
            .rpc
            .view_json(&self.contract_id, method, args, Finality::Optimistic)
            .await
            .with_context(|| format!("{}::{} view failed", self.contract_id, method))?;
        trace!(method, result = %value, "Contract view result");
        Ok(value)
    }
}

#[async_trait]
impl LendingProtocol for LendingContract {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    async fn get_user_ratio(&self, account: &str) -> Result<u128> {
        let value = self
            .view(methods::GET_USER_RATIO, &account_args(account))
            .await?;
        parse_u128(&value).with_context(|| format!("bad ratio for {}", account))
    }

    async fn list_liquidatable_accounts(&self) -> Result<Vec<String>> {
        let value = self.view(methods::LIST_LIQUIDATIONS, &json!({})).await?;
        serde_json::from_value(value).context("account list is not an array of strings")
    }

    async fn get_liquidation_line(&self) -> Result<u128> {
        let value = self.view(methods::GET_LIQUIDATION_LINE, &json!({})).await?;
        parse_u128(&value).context("bad liquidation line")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u128_forms() {
        assert_eq!(parse_u128(&json!("1500")).unwrap(), 1500);
        assert_eq!(parse_u128(&json!(1500)).unwrap(), 1500);
        assert_eq!(parse_u128(&json!("0")).unwrap(), 0);
        assert_eq!(parse_u128(&Value::Null).unwrap(), 0);
        assert_eq!(
            parse_u128(&json!("340282366920938463463374607431768211455")).unwrap(),
            u128::MAX
        );
    }

    #[test]
    fn test_parse_u128_rejects_garbage() {
        assert!(parse_u128(&json!("-5")).is_err());
        assert!(parse_u128(&json!(-5)).is_err());
        assert!(parse_u128(&json!(1.5)).is_err());
        assert!(parse_u128(&json!(["1"])).is_err());
    }

    #[test]
    fn test_account_args() {
        assert_eq!(
            serde_json::to_string(&account_args("alice.near")).unwrap(),
            r#"{"account":"alice.near"}"#
        );
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_mainnet_liquidation_line() {
        let rpc = Arc::new(NearRpcClient::new("https://rpc.mainnet.near.org").unwrap());
        let contract = LendingContract::new(rpc, "v3.oin_finance.near");
        let line = contract.get_liquidation_line().await.unwrap();
        assert!(line > 0);
    }
}
