//! Task tracking: polls the relay until a task reaches a terminal state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use safeswap_session::SessionScope;
use safeswap_store::TaskStore;
use safeswap_types::{RelayTask, Result, SwapError, TaskState};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::{RelayService, TaskWatcher};

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    /// Give up after this many polls; `None` polls until terminal.
    pub max_polls: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4_000,
            max_polls: None,
        }
    }
}

/// Polls relay task status and records every change in the store.
pub struct TaskTracker {
    service: Arc<dyn RelayService>,
    store: Arc<dyn TaskStore>,
    config: TrackerConfig,
    active: Mutex<HashSet<String>>,
}

/// Releases a task id when its tracking ends.
struct Claim<'a> {
    active: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.id);
        }
    }
}

impl TaskTracker {
    pub fn new(service: Arc<dyn RelayService>, store: Arc<dyn TaskStore>, config: TrackerConfig) -> Self {
        Self {
            service,
            store,
            config,
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn claim(&self, id: &str) -> Result<Claim<'_>> {
        let mut active = self
            .active
            .lock()
            .map_err(|e| SwapError::Other(format!("tracker lock poisoned: {}", e)))?;
        if !active.insert(id.to_string()) {
            return Err(SwapError::AlreadyTracking(id.to_string()));
        }
        Ok(Claim { active: &self.active, id: id.to_string() })
    }

    /// Store writes happen only while the scope is live.
    async fn record(&self, task: &RelayTask, scope: &SessionScope) -> Result<()> {
        scope.ensure_live()?;
        self.store.upsert_task(task).await
    }

    /// Poll `task` until it succeeds, is cancelled, or `scope` closes.
    #[instrument(skip_all, fields(task_id = %task.id, epoch = scope.epoch()))]
    pub async fn track(&self, mut task: RelayTask, scope: &SessionScope) -> Result<RelayTask> {
        let _claim = self.claim(&task.id)?;
        self.record(&task, scope).await?;

        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first poll waits one period.
        ticker.tick().await;

        let mut polls: u32 = 0;
        loop {
            tokio::select! {
                biased;
                _ = scope.closed() => return Err(SwapError::SessionClosed),
                _ = ticker.tick() => {}
            }
            scope.ensure_live()?;

            polls += 1;
            let status = tokio::select! {
                biased;
                _ = scope.closed() => return Err(SwapError::SessionClosed),
                status = self.service.task_status(&task.id) => status,
            };
            scope.ensure_live()?;

            match status {
                Err(e) => {
                    warn!(poll = polls, error = %e, "task status poll failed");
                    if task.state != TaskState::Unknown {
                        task.state = TaskState::Unknown;
                        self.record(&task, scope).await?;
                    }
                }
                Ok(status) => {
                    if let Some(hash) = status.transaction_hash {
                        if task.transaction_hash != Some(hash) {
                            debug!(tx_hash = %hash, "transaction hash observed");
                            task.transaction_hash = Some(hash);
                            self.record(&task, scope).await?;
                        }
                    }
                    if task.state != status.state {
                        task.state = status.state;
                        self.record(&task, scope).await?;
                    }
                    match task.state {
                        TaskState::ExecSuccess => {
                            info!(polls, tx_hash = ?task.transaction_hash, "task executed");
                            return Ok(task);
                        }
                        TaskState::Cancelled => {
                            warn!(polls, "task cancelled by relay");
                            return Err(SwapError::TaskCancelled { task_id: task.id.clone() });
                        }
                        TaskState::Pending | TaskState::Unknown => {}
                    }
                }
            }

            if let Some(max) = self.config.max_polls {
                if polls >= max {
                    warn!(polls, "giving up on task");
                    return Err(SwapError::TrackingTimeout { task_id: task.id.clone(), polls });
                }
            }
        }
    }
}

#[async_trait]
impl TaskWatcher for TaskTracker {
    async fn wait(&self, task: RelayTask, scope: &SessionScope) -> Result<RelayTask> {
        self.track(task, scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskStatus;
    use safeswap_session::testing::test_session;
    use safeswap_store::{MemoryStore, StoredRun};
    use safeswap_types::{Address, RelayPath, TxHash};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays scripted statuses, then reports `Pending` forever.
    #[derive(Default)]
    struct ScriptedRelay {
        script: Mutex<VecDeque<Result<TaskStatus>>>,
        polls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedRelay {
        fn new(script: Vec<Result<TaskStatus>>) -> Self {
            Self { script: Mutex::new(script.into()), ..Default::default() }
        }
    }

    #[async_trait]
    impl RelayService for ScriptedRelay {
        async fn submit(&self, _request: &crate::RelayRequest) -> Result<String> {
            Ok("unused".into())
        }

        async fn task_status(&self, _task_id: &str) -> Result<TaskStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(TaskStatus { state: TaskState::Pending, transaction_hash: None }))
        }
    }

    /// Memory store that remembers every task write.
    #[derive(Default)]
    struct SpyStore {
        inner: MemoryStore,
        writes: Mutex<Vec<RelayTask>>,
    }

    #[async_trait]
    impl TaskStore for SpyStore {
        async fn upsert_task(&self, task: &RelayTask) -> Result<()> {
            self.writes.lock().unwrap().push(task.clone());
            self.inner.upsert_task(task).await
        }
        async fn get_task(&self, id: &str) -> Result<Option<RelayTask>> {
            self.inner.get_task(id).await
        }
        async fn record_run(&self, run: &StoredRun) -> Result<()> {
            self.inner.record_run(run).await
        }
        async fn list_runs(&self, chain_id: Option<u64>) -> Result<Vec<StoredRun>> {
            self.inner.list_runs(chain_id).await
        }
    }

    fn pending() -> Result<TaskStatus> {
        Ok(TaskStatus { state: TaskState::Pending, transaction_hash: None })
    }

    fn task() -> RelayTask {
        RelayTask::pending("task-1", 100, RelayPath::Sponsored)
    }

    fn tracker(relay: Arc<ScriptedRelay>, store: Arc<SpyStore>, max_polls: Option<u32>) -> TaskTracker {
        TaskTracker::new(relay, store, TrackerConfig { max_polls, ..TrackerConfig::default() })
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_exec_success_with_hash() {
        let hash = TxHash::repeat_byte(0xab);
        let relay = Arc::new(ScriptedRelay::new(vec![
            pending(),
            pending(),
            Ok(TaskStatus { state: TaskState::ExecSuccess, transaction_hash: Some(hash) }),
        ]));
        let store = Arc::new(SpyStore::default());
        let session = test_session(Address::repeat_byte(1));

        let started = tokio::time::Instant::now();
        let done = tracker(relay.clone(), store.clone(), None).track(task(), &session.scope()).await.unwrap();

        assert_eq!(done.state, TaskState::ExecSuccess);
        assert_eq!(done.transaction_hash, Some(hash));
        assert_eq!(relay.polls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(12));
        assert!(started.elapsed() < Duration::from_secs(16));

        // The hash lands in the store before the terminal state does.
        let writes = store.writes.lock().unwrap();
        let first_hash = writes.iter().position(|t| t.transaction_hash.is_some()).unwrap();
        assert!(!writes[first_hash].state.is_terminal());
        assert_eq!(writes.last().unwrap().state, TaskState::ExecSuccess);
        drop(writes);
        assert_eq!(store.get_task("task-1").await.unwrap().unwrap().transaction_hash, Some(hash));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_hash_seen_before_terminal_state() {
        let hash = TxHash::repeat_byte(0x5a);
        let relay = Arc::new(ScriptedRelay::new(vec![
            pending(),
            Ok(TaskStatus { state: TaskState::Pending, transaction_hash: Some(hash) }),
            Ok(TaskStatus { state: TaskState::ExecSuccess, transaction_hash: None }),
        ]));
        let store = Arc::new(SpyStore::default());
        let session = test_session(Address::repeat_byte(1));

        let done = tracker(relay.clone(), store.clone(), None).track(task(), &session.scope()).await.unwrap();

        assert_eq!(done.state, TaskState::ExecSuccess);
        assert_eq!(done.transaction_hash, Some(hash));
        assert_eq!(relay.polls.load(Ordering::SeqCst), 3);

        let stored = store.get_task("task-1").await.unwrap().unwrap();
        assert_eq!(stored.state, TaskState::ExecSuccess);
        assert_eq!(stored.transaction_hash, Some(hash));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_fails() {
        let relay = Arc::new(ScriptedRelay::new(vec![Ok(TaskStatus {
            state: TaskState::Cancelled,
            transaction_hash: None,
        })]));
        let session = test_session(Address::repeat_byte(1));

        let err = tracker(relay, Arc::new(SpyStore::default()), None)
            .track(task(), &session.scope())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::TaskCancelled { ref task_id } if task_id == "task-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_marks_unknown_and_continues() {
        let relay = Arc::new(ScriptedRelay::new(vec![
            Err(SwapError::Network("connection reset".into())),
            Ok(TaskStatus { state: TaskState::ExecSuccess, transaction_hash: None }),
        ]));
        let store = Arc::new(SpyStore::default());
        let session = test_session(Address::repeat_byte(1));

        let done = tracker(relay, store.clone(), None).track(task(), &session.scope()).await.unwrap();
        assert_eq!(done.state, TaskState::ExecSuccess);

        let states: Vec<TaskState> = store.writes.lock().unwrap().iter().map(|t| t.state).collect();
        assert_eq!(states, vec![TaskState::Pending, TaskState::Unknown, TaskState::ExecSuccess]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_task_cannot_be_tracked_twice() {
        let relay = Arc::new(ScriptedRelay::default());
        let tracker = Arc::new(tracker(relay, Arc::new(SpyStore::default()), Some(3)));
        let session = test_session(Address::repeat_byte(1));

        let first = {
            let tracker = tracker.clone();
            let scope = session.scope();
            tokio::spawn(async move { tracker.track(task(), &scope).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = tracker.track(task(), &session.scope()).await.unwrap_err();
        assert!(matches!(err, SwapError::AlreadyTracking(_)));

        // Once the first tracker gives up the id can be claimed again.
        assert!(matches!(first.await.unwrap(), Err(SwapError::TrackingTimeout { polls: 3, .. })));
        assert!(tracker.claim("task-1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_polls_times_out() {
        let relay = Arc::new(ScriptedRelay::default());
        let session = test_session(Address::repeat_byte(1));

        let err = tracker(relay.clone(), Arc::new(SpyStore::default()), Some(2))
            .track(task(), &session.scope())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::TrackingTimeout { polls: 2, .. }));
        assert_eq!(relay.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_poll_stops_all_writes() {
        let relay = Arc::new(ScriptedRelay {
            script: Mutex::new(vec![Ok(TaskStatus {
                state: TaskState::ExecSuccess,
                transaction_hash: Some(TxHash::repeat_byte(1)),
            })]
            .into()),
            delay: Some(Duration::from_secs(3)),
            ..Default::default()
        });
        let store = Arc::new(SpyStore::default());
        let session = test_session(Address::repeat_byte(1));

        let handle = {
            let tracker = tracker(relay.clone(), store.clone(), None);
            let scope = session.scope();
            tokio::spawn(async move { tracker.track(task(), &scope).await })
        };

        // First poll starts at 4s and would answer at 7s.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(relay.polls.load(Ordering::SeqCst), 1);
        session.close();

        assert!(matches!(handle.await.unwrap(), Err(SwapError::SessionClosed)));
        tokio::time::sleep(Duration::from_secs(10)).await;
        let writes = store.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].state, TaskState::Pending);
    }

    #[tokio::test]
    async fn test_closed_scope_is_rejected_up_front() {
        let store = Arc::new(SpyStore::default());
        let session = test_session(Address::repeat_byte(1));
        session.close();

        let err = tracker(Arc::new(ScriptedRelay::default()), store.clone(), None)
            .track(task(), &session.scope())
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::SessionClosed));
        assert!(store.writes.lock().unwrap().is_empty());
    }
}
