//! JSON-RPC client for on-chain reads.
//!
//! Methods used:
//! - eth_getBalance
//! - eth_call (ERC20 `balanceOf`)
//! - eth_getCode

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use safeswap_types::{bytes_to_hex, hex_to_bytes, parse_u256, Address, Result, SwapError, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ChainReader;

sol! {
    function balanceOf(address owner) external view returns (uint256 balance);
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

/// Chain reader over a plain HTTP JSON-RPC endpoint.
pub struct JsonRpcReader {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcReader {
    pub fn new(url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(10_000);
        Self {
            url: url.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SwapError::Network(format!("rpc request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(SwapError::Network(format!(
                "rpc endpoint returned status {}",
                resp.status()
            )));
        }

        let body: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(format!("failed to parse rpc response: {}", e)))?;

        if let Some(err) = body.error {
            return Err(SwapError::Other(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }

        body.result
            .ok_or_else(|| SwapError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    async fn native_balance(&self, account: Address) -> Result<U256> {
        let hex: String = self
            .call("eth_getBalance", json!([account, "latest"]))
            .await?;
        parse_u256(&hex)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let data = balanceOfCall { owner }.abi_encode();
        let result: String = self
            .call(
                "eth_call",
                json!([{ "to": token, "data": bytes_to_hex(&data) }, "latest"]),
            )
            .await?;
        let raw = hex_to_bytes(&result)?;
        let decoded = balanceOfCall::abi_decode_returns(&raw, true)
            .map_err(|e| SwapError::InvalidResponse(format!("balanceOf decode failed: {}", e)))?;
        Ok(decoded.balance)
    }

    async fn is_deployed(&self, account: Address) -> Result<bool> {
        let code: String = self.call("eth_getCode", json!([account, "latest"])).await?;
        Ok(!hex_to_bytes(&code)?.is_empty())
    }
}
