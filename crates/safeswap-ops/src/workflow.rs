//! The swap workflow: approve (when needed), then swap, each step relayed
//! and tracked to completion before the next one starts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use safeswap_builder::{ApprovalAmount, MetaTxBuilder, SwapParams};
use safeswap_relay::{Relayer, TaskWatcher};
use safeswap_session::Session;
use safeswap_store::{RunStatus, StoredRun, TaskStore};
use safeswap_types::{MetaTransaction, RelayTask, Result, SwapError, Token, TxHash, U256};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub slippage_bps: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { slippage_bps: 100 }
    }
}

/// What the user asked to swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub src: Token,
    pub dst: Token,
    /// Amount of `src` in base units.
    pub amount: U256,
}

/// Observable progress of the current workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapPhase {
    Idle,
    BuildingApproval,
    SubmittingApproval,
    TrackingApproval { task_id: String },
    BuildingSwap,
    SubmittingSwap,
    TrackingSwap { task_id: String },
    Succeeded { tx_hash: Option<TxHash> },
    Failed { message: &'static str },
}

impl SwapPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapPhase::Succeeded { .. } | SwapPhase::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepAction {
    Approve,
    Swap,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub action: StepAction,
    pub task: Option<RelayTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Running,
    Success { tx_hash: Option<TxHash> },
    Failed { reason: String },
}

/// One swap attempt and the relay tasks it produced.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub id: String,
    pub steps: Vec<WorkflowStep>,
    pub current_index: usize,
    pub outcome: RunOutcome,
}

impl WorkflowRun {
    fn new(id: String) -> Self {
        Self { id, steps: Vec::new(), current_index: 0, outcome: RunOutcome::Running }
    }

    fn begin(&mut self, action: StepAction) {
        self.current_index = self.steps.len();
        self.steps.push(WorkflowStep { action, task: None });
    }

    fn set_task(&mut self, task: RelayTask) {
        if let Some(step) = self.steps.get_mut(self.current_index) {
            step.task = Some(task);
        }
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.steps.iter().filter_map(|s| s.task.as_ref().map(|t| t.id.clone())).collect()
    }
}

/// Result of asking the controller to swap.
#[derive(Debug, Clone)]
pub enum SwapStart {
    /// Nothing was done: zero amount, no live session, or a run in progress.
    Ignored,
    Finished(WorkflowRun),
}

/// Drives approve → swap workflows for the active account.
pub struct SwapController {
    builder: Arc<MetaTxBuilder>,
    relayer: Arc<dyn Relayer>,
    watcher: Arc<dyn TaskWatcher>,
    store: Arc<dyn TaskStore>,
    config: WorkflowConfig,
    phase: watch::Sender<SwapPhase>,
    running: Mutex<()>,
    runs: AtomicU64,
}

impl SwapController {
    pub fn new(
        builder: Arc<MetaTxBuilder>,
        relayer: Arc<dyn Relayer>,
        watcher: Arc<dyn TaskWatcher>,
        store: Arc<dyn TaskStore>,
        config: WorkflowConfig,
    ) -> Self {
        let (phase, _) = watch::channel(SwapPhase::Idle);
        Self {
            builder,
            relayer,
            watcher,
            store,
            config,
            phase,
            running: Mutex::new(()),
            runs: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SwapPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SwapPhase {
        self.phase.borrow().clone()
    }

    fn set_phase(&self, phase: SwapPhase) {
        debug!(?phase, "workflow phase");
        self.phase.send_replace(phase);
    }

    /// Run a swap to completion.
    ///
    /// Ignored without any network call when the amount is zero or the
    /// session is not live.
    #[instrument(skip_all, fields(src = request.src.symbol, dst = request.dst.symbol, amount = %request.amount))]
    pub async fn swap(&self, session: &Arc<Session>, request: SwapRequest) -> SwapStart {
        if request.amount.is_zero() {
            debug!("zero amount, nothing to do");
            return SwapStart::Ignored;
        }
        if !session.is_live() {
            debug!("no live session, nothing to do");
            return SwapStart::Ignored;
        }
        let Ok(_running) = self.running.try_lock() else {
            warn!("a swap is already running");
            return SwapStart::Ignored;
        };

        let seq = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let mut run = WorkflowRun::new(format!("{}-{}-{}", session.epoch(), Utc::now().timestamp_millis(), seq));
        let created_at = Utc::now();

        match self.execute(session, &request, &mut run).await {
            Ok(tx_hash) => {
                info!(run_id = %run.id, tx_hash = ?tx_hash, "swap succeeded");
                run.outcome = RunOutcome::Success { tx_hash };
                self.set_phase(SwapPhase::Succeeded { tx_hash });
            }
            Err(e) => {
                error!(run_id = %run.id, step = run.current_index, error = %e, "swap failed");
                run.outcome = RunOutcome::Failed { reason: e.to_string() };
                self.set_phase(SwapPhase::from(&e));
            }
        }

        self.persist(session, &request, &run, created_at).await;
        SwapStart::Finished(run)
    }

    async fn execute(&self, session: &Arc<Session>, request: &SwapRequest, run: &mut WorkflowRun) -> Result<Option<TxHash>> {
        let scope = session.scope();
        let account = session.active_account;

        self.set_phase(SwapPhase::BuildingApproval);
        let approvals = self
            .builder
            .build_approval(&request.src, ApprovalAmount::from_amount(request.amount), account)
            .await?;
        scope.ensure_live()?;

        if !approvals.is_empty() {
            run.begin(StepAction::Approve);
            self.set_phase(SwapPhase::SubmittingApproval);
            let task = self.relay_step(session, run, &approvals).await?;
            self.set_phase(SwapPhase::TrackingApproval { task_id: task.id.clone() });
            let done = self.watcher.wait(task, &scope).await?;
            run.set_task(done);
        }

        self.set_phase(SwapPhase::BuildingSwap);
        let params = SwapParams {
            src: request.src,
            dst: request.dst,
            amount: request.amount,
            from: account,
            slippage_bps: self.config.slippage_bps,
        };
        let swap = self.builder.build_swap(&params).await?;
        scope.ensure_live()?;

        run.begin(StepAction::Swap);
        self.set_phase(SwapPhase::SubmittingSwap);
        let task = self.relay_step(session, run, &[swap]).await?;
        self.set_phase(SwapPhase::TrackingSwap { task_id: task.id.clone() });
        let done = self.watcher.wait(task, &scope).await?;
        let tx_hash = done.transaction_hash;
        run.set_task(done);
        Ok(tx_hash)
    }

    async fn relay_step(&self, session: &Session, run: &mut WorkflowRun, batch: &[MetaTransaction]) -> Result<RelayTask> {
        let task = self.relayer.submit(session, batch).await?;
        info!(run_id = %run.id, task_id = %task.id, path = ?task.path, "step submitted");
        run.set_task(task.clone());
        Ok(task)
    }

    /// Append the finished run to the history while the session is live.
    async fn persist(&self, session: &Session, request: &SwapRequest, run: &WorkflowRun, created_at: chrono::DateTime<Utc>) {
        if !session.is_live() {
            debug!(run_id = %run.id, "session closed, run not recorded");
            return;
        }
        let (status, tx_hash, error) = match &run.outcome {
            RunOutcome::Success { tx_hash } => (RunStatus::Succeeded, *tx_hash, None),
            RunOutcome::Failed { reason } => (RunStatus::Failed, None, Some(reason.clone())),
            RunOutcome::Running => return,
        };
        let stored = StoredRun {
            id: run.id.clone(),
            chain_id: session.chain_id,
            account: session.active_account,
            status,
            task_ids: run.task_ids(),
            tx_hash,
            error,
            created_at,
            finished_at: Utc::now(),
            data: serde_json::json!({
                "src": request.src.symbol,
                "dst": request.dst.symbol,
                "amount": request.amount.to_string(),
                "steps": run.steps,
            }),
        };
        if let Err(e) = self.store.record_run(&stored).await {
            warn!(run_id = %run.id, error = %e, "failed to record run");
        }
    }
}

impl From<&SwapError> for SwapPhase {
    fn from(err: &SwapError) -> Self {
        SwapPhase::Failed { message: err.user_message() }
    }
}
