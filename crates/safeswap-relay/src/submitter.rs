//! Signing and submission of meta-transaction batches.
//!
//! The fee path is decided once per submission: a deployed account with a
//! configured sponsor goes through the sponsored endpoint, anything else
//! pays for itself. A rejected submission is never retried on the other
//! path.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use safeswap_chain::ChainReader;
use safeswap_session::Session;
use safeswap_types::{address, Address, MetaTransaction, RelayTask, Result, SwapError};
use tracing::{debug, info, instrument, warn};

use crate::batch::encode_batch;
use crate::{RelayFee, RelayRequest, RelayService, Relayer};

/// MultiSend (call-only) deployment shared by Gnosis chain and mainnet.
pub const DEFAULT_MULTISEND: Address = address!("40A2aCCbd92BCA938b02010E17A5b8929b49130D");

/// Relay fee policy.
#[derive(Clone)]
pub struct RelayPolicy {
    /// Enables the sponsored path for deployed accounts.
    pub sponsor_api_key: Option<String>,
    /// Token the self-funded path pays fees in; zero means native.
    pub fee_token: Address,
    pub multisend_address: Address,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            sponsor_api_key: None,
            fee_token: Address::ZERO,
            multisend_address: DEFAULT_MULTISEND,
        }
    }
}

impl fmt::Debug for RelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayPolicy")
            .field("sponsor_api_key", &self.sponsor_api_key.as_ref().map(|_| "<redacted>"))
            .field("fee_token", &self.fee_token)
            .field("multisend_address", &self.multisend_address)
            .finish()
    }
}

/// Relayer backed by a relay service and a chain reader.
pub struct RelayClient {
    service: Arc<dyn RelayService>,
    chain: Arc<dyn ChainReader>,
    policy: RelayPolicy,
}

impl RelayClient {
    pub fn new(service: Arc<dyn RelayService>, chain: Arc<dyn ChainReader>, policy: RelayPolicy) -> Self {
        Self { service, chain, policy }
    }

    fn fee_for(&self, deployed: bool) -> RelayFee {
        match (&self.policy.sponsor_api_key, deployed) {
            (Some(key), true) => RelayFee::Sponsored { api_key: key.clone() },
            _ => RelayFee::SelfFunded { fee_token: self.policy.fee_token },
        }
    }
}

#[async_trait]
impl Relayer for RelayClient {
    #[instrument(skip_all, fields(account = %session.active_account, calls = batch.len()))]
    async fn submit(&self, session: &Session, batch: &[MetaTransaction]) -> Result<RelayTask> {
        let scope = session.scope();
        let signer = session.signer()?;
        let call = encode_batch(batch, self.policy.multisend_address)?;

        let deployed = self
            .chain
            .is_deployed(session.active_account)
            .await
            .map_err(|e| SwapError::Relay(format!("deployment check failed: {}", e)))?;
        let fee = self.fee_for(deployed);
        debug!(deployed, path = ?fee.path(), "selected relay path");

        scope.ensure_live()?;
        let signed = signer
            .sign_account_call(session.active_account, session.chain_id, &call)
            .await
            .map_err(|e| match e {
                SwapError::SessionClosed => e,
                other => SwapError::Relay(format!("signing failed: {}", other)),
            })?;
        scope.ensure_live()?;

        let path = fee.path();
        let request = RelayRequest {
            chain_id: session.chain_id,
            target: signed.target,
            data: signed.data,
            fee,
        };
        let task_id = self.service.submit(&request).await.map_err(|e| {
            warn!(?path, error = %e, "relay submission failed");
            e
        })?;

        info!(task_id = %task_id, ?path, "relay task submitted");
        Ok(RelayTask::pending(task_id, session.chain_id, path))
    }
}
