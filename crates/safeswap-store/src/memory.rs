//! In-memory storage adapter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{StoredRun, TaskStore};
use safeswap_types::{RelayTask, Result, SwapError};

/// In-memory storage adapter (for testing and ephemeral use).
pub struct MemoryStore {
    tasks: Mutex<HashMap<String, RelayTask>>,
    runs: Mutex<Vec<StoredRun>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> SwapError {
    SwapError::Other("memory store lock poisoned".into())
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn upsert_task(&self, task: &RelayTask) -> Result<()> {
        let mut tasks = self.tasks.lock().map_err(poisoned)?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<RelayTask>> {
        let tasks = self.tasks.lock().map_err(poisoned)?;
        Ok(tasks.get(id).cloned())
    }

    async fn record_run(&self, run: &StoredRun) -> Result<()> {
        let mut runs = self.runs.lock().map_err(poisoned)?;
        if let Some(existing) = runs.iter_mut().find(|r| r.id == run.id) {
            *existing = run.clone();
        } else {
            runs.push(run.clone());
        }
        Ok(())
    }

    async fn list_runs(&self, chain_id: Option<u64>) -> Result<Vec<StoredRun>> {
        let runs = self.runs.lock().map_err(poisoned)?;
        let filtered = runs
            .iter()
            .filter(|r| chain_id.map_or(true, |cid| r.chain_id == cid))
            .cloned()
            .collect();
        Ok(filtered)
    }
}
