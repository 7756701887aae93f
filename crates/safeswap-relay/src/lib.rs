//! Relay submission and task tracking.
//!
//! - Encode a batch of meta-transactions as one account call
//! - Sign it and submit through the sponsored or self-funded relay path
//! - Poll the relay for the task's terminal state

use std::fmt;

use async_trait::async_trait;
use safeswap_session::{Session, SessionScope};
use safeswap_types::{Address, Bytes, MetaTransaction, RelayPath, RelayTask, Result, TaskState, TxHash};

pub mod batch;
pub mod relay_client;
pub mod submitter;
pub mod tracker;

pub use relay_client::RelayHttpClient;
pub use submitter::{RelayClient, RelayPolicy};
pub use tracker::{TaskTracker, TrackerConfig};

/// Who pays for execution of a relayed call.
#[derive(Clone, PartialEq, Eq)]
pub enum RelayFee {
    Sponsored { api_key: String },
    /// Fees are taken from the account in `fee_token`.
    SelfFunded { fee_token: Address },
}

impl RelayFee {
    pub fn path(&self) -> RelayPath {
        match self {
            RelayFee::Sponsored { .. } => RelayPath::Sponsored,
            RelayFee::SelfFunded { .. } => RelayPath::SelfFunded,
        }
    }
}

impl fmt::Debug for RelayFee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayFee::Sponsored { .. } => f.debug_struct("Sponsored").field("api_key", &"<redacted>").finish(),
            RelayFee::SelfFunded { fee_token } => {
                f.debug_struct("SelfFunded").field("fee_token", fee_token).finish()
            }
        }
    }
}

/// Relay request for a signed account call.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub chain_id: u64,
    pub target: Address,
    pub data: Bytes,
    pub fee: RelayFee,
}

/// Task status reported by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub transaction_hash: Option<TxHash>,
}

/// The external relay service.
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Submit a request; returns the relay-assigned task id.
    async fn submit(&self, request: &RelayRequest) -> Result<String>;

    /// Current status of a task.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus>;
}

/// Signs and submits batches on behalf of a session's active account.
#[async_trait]
pub trait Relayer: Send + Sync {
    async fn submit(&self, session: &Session, batch: &[MetaTransaction]) -> Result<RelayTask>;
}

/// Awaits the terminal state of a submitted task.
#[async_trait]
pub trait TaskWatcher: Send + Sync {
    /// Resolve with the task once it reaches `ExecSuccess`.
    ///
    /// Fails with `TaskCancelled` when the relay cancels it, and with
    /// `SessionClosed` when `scope` closes first.
    async fn wait(&self, task: RelayTask, scope: &SessionScope) -> Result<RelayTask>;
}
