//! Session management for SafeSwap.
//!
//! A `Session` is the explicit context handed to every other component:
//! owner identity, chain, accounts and the signing identity. Each session
//! carries a `SessionScope` that closes on sign-out, chain switch or account
//! switch, which is how pollers and trackers know to stop.

use std::sync::Arc;

use async_trait::async_trait;
use safeswap_types::{AccountSigner, Address, Result, SwapError};
use tokio::sync::watch;

pub mod manager;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use manager::SessionManager;

/// Result of a successful external sign-in flow.
pub struct AuthGrant {
    pub owner: Address,
    /// Accounts already owned by `owner` on the requested chain.
    pub accounts: Vec<Address>,
    pub signer: Arc<dyn AccountSigner>,
}

/// The social-login wallet provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, chain_id: u64) -> Result<AuthGrant>;
    async fn sign_out(&self) -> Result<()>;
}

/// Account-abstraction collaborator deriving not-yet-deployed accounts.
#[async_trait]
pub trait AccountFactory: Send + Sync {
    async fn counterfactual_address(&self, owner: Address, chain_id: u64) -> Result<Address>;
}

/// Liveness handle tied to one session epoch.
///
/// Cheap to clone; every poller holds one and checks it after each
/// suspension point.
#[derive(Debug, Clone)]
pub struct SessionScope {
    epoch: u64,
    closed: watch::Receiver<bool>,
}

impl SessionScope {
    /// A scope owned by no session. Sending `true` (or dropping the sender)
    /// closes it.
    pub fn detached(epoch: u64) -> (watch::Sender<bool>, SessionScope) {
        let (tx, closed) = watch::channel(false);
        (tx, SessionScope { epoch, closed })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_live(&self) -> bool {
        !*self.closed.borrow() && self.closed.has_changed().is_ok()
    }

    /// Resolves once the owning session has been torn down.
    pub async fn closed(&self) {
        let mut rx = self.closed.clone();
        // A dropped sender means the session is gone as well.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Fail with `SessionClosed` unless the scope is still live.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(SwapError::SessionClosed)
        }
    }
}

/// An authenticated session.
pub struct Session {
    pub owner: Address,
    pub chain_id: u64,
    pub accounts: Vec<Address>,
    pub active_account: Address,
    signer: Arc<dyn AccountSigner>,
    scope: SessionScope,
    teardown: watch::Sender<bool>,
}

impl Session {
    pub fn new(
        epoch: u64,
        owner: Address,
        chain_id: u64,
        accounts: Vec<Address>,
        active_account: Address,
        signer: Arc<dyn AccountSigner>,
    ) -> Arc<Self> {
        let (teardown, closed) = watch::channel(false);
        Arc::new(Self {
            owner,
            chain_id,
            accounts,
            active_account,
            signer,
            scope: SessionScope { epoch, closed },
            teardown,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.scope.epoch
    }

    pub fn scope(&self) -> SessionScope {
        self.scope.clone()
    }

    pub fn is_live(&self) -> bool {
        self.scope.is_live()
    }

    /// The signing identity, only while the session is live.
    pub fn signer(&self) -> Result<Arc<dyn AccountSigner>> {
        self.scope.ensure_live()?;
        Ok(Arc::clone(&self.signer))
    }

    /// Tear the session down. Idempotent.
    pub fn close(&self) {
        self.teardown.send_replace(true);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("owner", &self.owner)
            .field("chain_id", &self.chain_id)
            .field("accounts", &self.accounts)
            .field("active_account", &self.active_account)
            .field("epoch", &self.scope.epoch)
            .field("live", &self.is_live())
            .finish()
    }
}
