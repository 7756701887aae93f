//! HTTP client for the swap aggregator API.
//!
//! Endpoints (relative to a chain-scoped base URL):
//! - GET quote
//! - GET swap
//! - GET approve/transaction
//! - GET approve/allowance
//!
//! The bearer token is read from server-side configuration and never
//! shipped to end users.

use std::time::Duration;

use async_trait::async_trait;
use safeswap_types::{hex_to_bytes, parse_u256, Address, MetaTransaction, Result, SwapError, U256};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::{ApprovalAmount, SwapParams};

/// Swap quotation/execution service.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// Indicative output amount for `amount` of `src`.
    async fn quote(&self, src: Address, dst: Address, amount: U256) -> Result<U256>;

    /// Executable swap payload.
    async fn swap_transaction(&self, params: &SwapParams) -> Result<MetaTransaction>;

    /// Payload approving the aggregator router to spend `token`.
    async fn approve_transaction(&self, token: Address, amount: ApprovalAmount) -> Result<MetaTransaction>;

    /// Current allowance of `owner` towards the aggregator router.
    async fn allowance(&self, token: Address, owner: Address) -> Result<U256>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    to_amount: String,
}

#[derive(Debug, Deserialize)]
struct TxBody {
    to: String,
    data: String,
    value: String,
}

impl TxBody {
    fn into_meta_transaction(self) -> Result<MetaTransaction> {
        let to: Address = self
            .to
            .parse()
            .map_err(|e| SwapError::InvalidResponse(format!("invalid tx.to {:?}: {}", self.to, e)))?;
        Ok(MetaTransaction::new(to, hex_to_bytes(&self.data)?, parse_u256(&self.value)?))
    }
}

#[derive(Debug, Deserialize)]
struct SwapBody {
    tx: TxBody,
}

#[derive(Debug, Deserialize)]
struct AllowanceBody {
    allowance: String,
}

/// Provider-specific error body, kept opaque.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    error: Option<String>,
    description: Option<String>,
    status_code: Option<u16>,
}

/// Slippage in basis points rendered as the percentage the API expects.
fn slippage_percent(bps: u32) -> String {
    format!("{}", f64::from(bps) / 100.0)
}

/// Swap API client.
pub struct SwapApiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
}

impl SwapApiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(15_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let mut req = self
            .client
            .get(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SwapError::Network(format!("swap api request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => err
                    .description
                    .or(err.error)
                    .unwrap_or_else(|| format!("status code {:?}", err.status_code)),
                Err(_) => body,
            };
            return Err(SwapError::Quote(format!("{} returned {}: {}", method, status, detail)));
        }

        resp.json()
            .await
            .map_err(|e| SwapError::InvalidResponse(format!("failed to parse {} response: {}", method, e)))
    }
}

#[async_trait]
impl SwapApi for SwapApiClient {
    async fn quote(&self, src: Address, dst: Address, amount: U256) -> Result<U256> {
        let body: QuoteBody = self
            .get(
                "quote",
                &[
                    ("src", src.to_string()),
                    ("dst", dst.to_string()),
                    ("amount", amount.to_string()),
                ],
            )
            .await?;
        parse_u256(&body.to_amount)
    }

    async fn swap_transaction(&self, params: &SwapParams) -> Result<MetaTransaction> {
        debug!(src = params.src.symbol, dst = params.dst.symbol, amount = %params.amount, "requesting swap payload");
        let body: SwapBody = self
            .get(
                "swap",
                &[
                    ("src", params.src.address.to_string()),
                    ("dst", params.dst.address.to_string()),
                    ("amount", params.amount.to_string()),
                    ("from", params.from.to_string()),
                    ("slippage", slippage_percent(params.slippage_bps)),
                    ("disableEstimate", "false".to_string()),
                    ("allowPartialFill", "false".to_string()),
                ],
            )
            .await?;
        body.tx.into_meta_transaction()
    }

    async fn approve_transaction(&self, token: Address, amount: ApprovalAmount) -> Result<MetaTransaction> {
        let mut query = vec![("tokenAddress", token.to_string())];
        if let ApprovalAmount::Exact(value) = amount {
            query.push(("amount", value.to_string()));
        }
        let body: TxBody = self.get("approve/transaction", &query).await?;
        body.into_meta_transaction()
    }

    async fn allowance(&self, token: Address, owner: Address) -> Result<U256> {
        let body: AllowanceBody = self
            .get(
                "approve/allowance",
                &[("tokenAddress", token.to_string()), ("walletAddress", owner.to_string())],
            )
            .await?;
        parse_u256(&body.allowance)
    }
}
