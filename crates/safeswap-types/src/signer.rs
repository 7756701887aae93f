//! Signing identity supplied by the wallet/session provider.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// How the account executes a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CallOperation {
    Call = 0,
    DelegateCall = 1,
}

/// One call to be executed by the smart-contract account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: CallOperation,
}

/// Account-executable payload produced by the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    /// Contract the relay must call (the account itself, or its factory
    /// when the account is not deployed yet).
    pub target: Address,
    /// Encoded, signed call data for `target`.
    pub data: Bytes,
}

/// Signer for a smart-contract account owner.
///
/// The wallet cryptography lives behind this trait; the orchestrator only
/// hands it a call and forwards the resulting payload to the relay.
#[async_trait]
pub trait AccountSigner: Send + Sync {
    /// Address of the externally owned key controlling the account.
    fn owner(&self) -> Address;

    /// Sign `call` for execution by `account` on `chain_id`.
    async fn sign_account_call(
        &self,
        account: Address,
        chain_id: u64,
        call: &AccountCall,
    ) -> Result<SignedCall>;
}
