//! HTTP client for the relay service.
//!
//! Endpoints:
//! - POST /relays/v2/sponsored-call
//! - POST /relays/v2/call-with-sync-fee
//! - GET /tasks/status/<task_id>

use std::time::Duration;

use async_trait::async_trait;
use safeswap_types::{bytes_to_hex, Address, Result, SwapError, TaskState, TxHash};
use serde::{Deserialize, Serialize};

use crate::{RelayFee, RelayRequest, RelayService, TaskStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsoredCallBody<'a> {
    chain_id: u64,
    target: Address,
    data: String,
    sponsor_api_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncFeeCallBody {
    chain_id: u64,
    target: Address,
    data: String,
    fee_token: Address,
    is_relay_context: bool,
}

/// Relay response after submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskBody {
    task_state: String,
    transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusResponse {
    task: TaskBody,
}

impl TaskBody {
    fn into_status(self) -> Result<TaskStatus> {
        let transaction_hash = match self.transaction_hash.as_deref() {
            None | Some("") => None,
            Some(hash) => Some(hash.parse::<TxHash>().map_err(|e| {
                SwapError::InvalidResponse(format!("invalid transaction hash {:?}: {}", hash, e))
            })?),
        };
        Ok(TaskStatus {
            state: TaskState::from_wire(&self.task_state),
            transaction_hash,
        })
    }
}

/// Relay client for submitting transactions.
pub struct RelayHttpClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayHttpClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Link to the public status page of a task.
    pub fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/status/{}", self.base_url, task_id)
    }
}

#[async_trait]
impl RelayService for RelayHttpClient {
    /// Submit a sponsored or self-funded call.
    ///
    /// POST /relays/v2/sponsored-call or /relays/v2/call-with-sync-fee
    async fn submit(&self, request: &RelayRequest) -> Result<String> {
        let data = bytes_to_hex(&request.data);
        let builder = match &request.fee {
            RelayFee::Sponsored { api_key } => self
                .client
                .post(format!("{}/relays/v2/sponsored-call", self.base_url))
                .json(&SponsoredCallBody {
                    chain_id: request.chain_id,
                    target: request.target,
                    data,
                    sponsor_api_key: api_key,
                }),
            RelayFee::SelfFunded { fee_token } => self
                .client
                .post(format!("{}/relays/v2/call-with-sync-fee", self.base_url))
                .json(&SyncFeeCallBody {
                    chain_id: request.chain_id,
                    target: request.target,
                    data,
                    fee_token: *fee_token,
                    is_relay_context: false,
                }),
        };

        let resp = builder
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SwapError::Relay(format!("relay request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SwapError::SubmissionRejected(format!(
                "relay returned status {}: {}",
                status, body
            )));
        }

        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| SwapError::SubmissionRejected(format!("relay reply has no task id: {}", e)))?;

        if body.task_id.is_empty() {
            return Err(SwapError::SubmissionRejected("relay returned an empty task id".into()));
        }
        Ok(body.task_id)
    }

    /// Poll the status of a relay task.
    ///
    /// GET /tasks/status/<task_id>
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let resp = self
            .client
            .get(self.task_url(task_id))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SwapError::Network(format!("relay status request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(SwapError::Network(format!(
                "relay status returned {} for task {}",
                resp.status(),
                task_id
            )));
        }

        let body: StatusResponse = resp
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(format!("failed to parse task status: {}", e)))?;

        body.task.into_status()
    }
}
