//! Shared data model for the SafeSwap relay orchestrator.
//!
//! - Meta-transactions and relay tasks
//! - Static token registry
//! - Unit parsing/formatting helpers
//! - The `SwapError` taxonomy used across all crates

use alloy_primitives::utils::{format_units, parse_units};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod signer;
pub mod tokens;

pub use alloy_primitives::{address, Address, Bytes, TxHash, U256};
pub use signer::{AccountCall, AccountSigner, CallOperation, SignedCall};
pub use tokens::{Token, NATIVE_ASSET};

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Message shown to the user for any failed workflow.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong with your swap, please try again.";

/// Message shown when the relay service cancelled execution.
pub const RELAY_CANCELLED_MESSAGE: &str = "The relay cancelled your transaction.";

/// SafeSwap error types.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quote failed: {0}")]
    Quote(String),

    #[error("relay error: {0}")]
    Relay(String),

    #[error("relay rejected submission: {0}")]
    SubmissionRejected(String),

    #[error("relay cancelled task {task_id}")]
    TaskCancelled { task_id: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("session closed")]
    SessionClosed,

    #[error("task {0} is already being tracked")]
    AlreadyTracking(String),

    #[error("task {task_id} still not terminal after {polls} polls")]
    TrackingTimeout { task_id: String, polls: u32 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SwapError {
    /// The single user-visible message for this failure.
    ///
    /// Relay cancellations get their own wording; everything else collapses
    /// into the generic message and is detailed in logs instead.
    pub fn user_message(&self) -> &'static str {
        match self {
            SwapError::TaskCancelled { .. } => RELAY_CANCELLED_MESSAGE,
            SwapError::Auth(_) | SwapError::SessionClosed => "Please log in again.",
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// Transient failures are retried by pollers instead of failing a run.
    pub fn is_transient(&self) -> bool {
        matches!(self, SwapError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;

/// A single call executed through the smart-contract account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

impl MetaTransaction {
    pub fn new(to: Address, data: impl Into<Bytes>, value: U256) -> Self {
        Self { to, data: data.into(), value }
    }
}

/// Relay task state as observed by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    ExecSuccess,
    Cancelled,
    /// The last status poll failed; the task may still be in flight.
    Unknown,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::ExecSuccess | TaskState::Cancelled)
    }

    /// Map a relay wire state onto the tracker's states.
    ///
    /// `ExecReverted` ends the task just like a cancellation; every
    /// intermediate state (`CheckPending`, `ExecPending`,
    /// `WaitingForConfirmation`, ...) is still pending.
    pub fn from_wire(state: &str) -> Self {
        match state {
            "ExecSuccess" => TaskState::ExecSuccess,
            "Cancelled" | "ExecReverted" => TaskState::Cancelled,
            _ => TaskState::Pending,
        }
    }
}

/// Which relay path paid for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayPath {
    /// Gas paid by a sponsor (account already deployed).
    Sponsored,
    /// Gas paid from the account's own native balance.
    SelfFunded,
}

/// Handle for a transaction accepted by the relay service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTask {
    pub id: String,
    pub chain_id: u64,
    pub submitted_at: DateTime<Utc>,
    pub state: TaskState,
    pub transaction_hash: Option<TxHash>,
    pub path: RelayPath,
}

impl RelayTask {
    pub fn pending(id: impl Into<String>, chain_id: u64, path: RelayPath) -> Self {
        Self {
            id: id.into(),
            chain_id,
            submitted_at: Utc::now(),
            state: TaskState::Pending,
            transaction_hash: None,
            path,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Parse a user-entered decimal amount into base units.
///
/// Negative, empty or malformed input is rejected rather than clamped.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256> {
    let input = input.trim();
    if input.is_empty() || input.starts_with('-') {
        return Err(SwapError::InvalidAmount(input.to_string()));
    }
    parse_units(input, decimals)
        .map(|units| units.get_absolute())
        .map_err(|e| SwapError::InvalidAmount(format!("{}: {}", input, e)))
}

/// Format base units as a decimal string without trailing zeros ("1.5", "2.0").
pub fn format_amount(amount: U256, decimals: u8) -> String {
    let formatted = match format_units(amount, decimals) {
        Ok(s) => s,
        Err(_) => return amount.to_string(),
    };
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{}.0", whole)
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => formatted,
    }
}

/// Parse a decimal (or 0x-prefixed hex) integer string into a `U256`.
pub fn parse_u256(s: &str) -> Result<U256> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x") {
        Some(hex_digits) if hex_digits.is_empty() => Ok(U256::ZERO),
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|e| SwapError::InvalidResponse(format!("invalid integer {:?}: {}", s, e)))
}

/// Parse a hex string to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Bytes> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str)
        .map(Bytes::from)
        .map_err(|e| SwapError::InvalidResponse(format!("invalid hex: {}", e)))
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> Hex {
    format!("0x{}", hex::encode(bytes))
}
