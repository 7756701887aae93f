//! Storage adapter trait and implementations for SafeSwap.
//!
//! Defines the `TaskStore` trait that every storage backend implements.
//! The Task Tracker is the only writer of relay tasks; the workflow
//! controller appends finished runs to the history.
//! Provides a `MemoryStore` for testing and ephemeral use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use safeswap_types::{Address, RelayTask, Result, TxHash};

pub mod memory;

pub use memory::MemoryStore;

/// Final outcome of a stored workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// A finished swap workflow (transaction history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: String,
    pub chain_id: u64,
    pub account: Address,
    pub status: RunStatus,
    pub task_ids: Vec<String>,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// The core storage adapter trait.
///
/// All methods are async to support both in-memory and persistent backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // --- Relay tasks ---
    async fn upsert_task(&self, task: &RelayTask) -> Result<()>;
    async fn get_task(&self, id: &str) -> Result<Option<RelayTask>>;

    // --- Run history ---
    async fn record_run(&self, run: &StoredRun) -> Result<()>;
    async fn list_runs(&self, chain_id: Option<u64>) -> Result<Vec<StoredRun>>;
}
