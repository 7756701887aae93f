//! On-chain reads and the balance poller.
//!
//! The poller keeps a near-real-time view of the active account:
//! - native asset balance
//! - `balanceOf` for a fixed token set, looked up concurrently
//!
//! Each lookup fails on its own; a failed entry is reported as
//! `Unavailable` and simply retried on the next tick.

pub mod rpc_client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use safeswap_session::{Session, SessionScope};
use safeswap_types::{format_amount, Address, Result, Token, U256};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use rpc_client::JsonRpcReader;

/// Read-only chain access used by the poller and the relay client.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn native_balance(&self, account: Address) -> Result<U256>;
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    /// Whether contract code exists at `account`.
    async fn is_deployed(&self, account: Address) -> Result<bool>;
}

/// Balance poller configuration.
#[derive(Debug, Clone)]
pub struct BalancePollerConfig {
    pub interval_ms: u64,
    pub native_decimals: u8,
}

impl Default for BalancePollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 12_000,
            native_decimals: 18,
        }
    }
}

/// One balance entry: formatted, or explicitly unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BalanceEntry {
    Available(String),
    Unavailable,
}

impl BalanceEntry {
    pub fn is_available(&self) -> bool {
        matches!(self, BalanceEntry::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBalance {
    pub token: Token,
    pub balance: BalanceEntry,
}

/// Result of one poll tick; `tokens` is parallel to the poller's token set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub account: Address,
    pub native: BalanceEntry,
    pub tokens: Vec<TokenBalance>,
    pub fetched_at: DateTime<Utc>,
}

/// Polls balances for the active account of a session.
pub struct BalancePoller {
    reader: Arc<dyn ChainReader>,
    tokens: Vec<Token>,
    config: BalancePollerConfig,
}

impl BalancePoller {
    pub fn new(reader: Arc<dyn ChainReader>, tokens: Vec<Token>, config: BalancePollerConfig) -> Self {
        Self { reader, tokens, config }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn entry(&self, result: &Result<U256>, decimals: u8, label: &str, account: Address) -> BalanceEntry {
        match result {
            Ok(amount) => BalanceEntry::Available(format_amount(*amount, decimals)),
            Err(e) => {
                debug!(token = label, %account, error = %e, "balance lookup failed");
                BalanceEntry::Unavailable
            }
        }
    }

    /// Run a single poll tick for `account`.
    ///
    /// Never fails: lookups are isolated and failed ones are marked
    /// unavailable. Native-asset entries in the token set reuse the
    /// native lookup.
    pub async fn poll_once(&self, account: Address) -> BalanceSnapshot {
        let native = self.reader.native_balance(account);
        let erc20 = join_all(
            self.tokens
                .iter()
                .filter(|t| !t.is_native())
                .map(|t| self.reader.token_balance(t.address, account)),
        );
        let (native, erc20) = futures::join!(native, erc20);

        let mut erc20 = erc20.into_iter();
        let tokens: Vec<TokenBalance> = self
            .tokens
            .iter()
            .map(|token| {
                let balance = if token.is_native() {
                    self.entry(&native, token.decimals, token.symbol, account)
                } else {
                    match erc20.next() {
                        Some(result) => self.entry(&result, token.decimals, token.symbol, account),
                        None => BalanceEntry::Unavailable,
                    }
                };
                TokenBalance { token: *token, balance }
            })
            .collect();
        let native = self.entry(&native, self.config.native_decimals, "native", account);

        let missing = tokens.iter().filter(|t| !t.balance.is_available()).count();
        if missing > 0 {
            warn!(%account, missing, total = tokens.len(), "some token balances unavailable");
        }

        BalanceSnapshot {
            account,
            native,
            tokens,
            fetched_at: Utc::now(),
        }
    }

    /// Start polling the session's active account.
    ///
    /// Returns `None` when the session is already torn down. The loop stops
    /// as soon as the session scope closes and never publishes afterwards.
    pub fn spawn(self: &Arc<Self>, session: &Session) -> Option<PollerHandle> {
        let scope = session.scope();
        if !scope.is_live() {
            return None;
        }
        let account = session.active_account;
        let (tx, rx) = watch::channel(None);
        let poller = Arc::clone(self);
        let period = Duration::from_millis(self.config.interval_ms);

        info!(%account, epoch = scope.epoch(), interval_ms = self.config.interval_ms, "starting balance poller");
        let task = tokio::spawn(async move {
            poller.run(scope, account, period, tx).await;
        });
        Some(PollerHandle { rx, task })
    }

    async fn run(
        &self,
        scope: SessionScope,
        account: Address,
        period: Duration,
        tx: watch::Sender<Option<BalanceSnapshot>>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = scope.closed() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                _ = scope.closed() => break,
                snapshot = self.poll_once(account) => snapshot,
            };

            if !scope.is_live() {
                break;
            }
            tx.send_replace(Some(snapshot));
        }
        debug!(%account, epoch = scope.epoch(), "balance poller stopped");
    }
}

/// Handle to a running balance poller. Dropping it stops the loop.
pub struct PollerHandle {
    rx: watch::Receiver<Option<BalanceSnapshot>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<Option<BalanceSnapshot>> {
        self.rx.clone()
    }

    pub fn latest(&self) -> Option<BalanceSnapshot> {
        self.rx.borrow().clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
