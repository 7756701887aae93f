//! The Session Manager owns authentication state.

use std::sync::{Arc, RwLock};

use safeswap_types::{Address, Result, SwapError};
use tracing::{info, instrument, warn};

use crate::{AccountFactory, AuthProvider, Session};

struct ManagerState {
    chain_id: u64,
    epoch: u64,
    session: Option<Arc<Session>>,
}

/// Creates, replaces and tears down sessions.
///
/// Only the manager mutates session state; other components hold
/// `Arc<Session>` and watch its scope.
pub struct SessionManager {
    auth: Arc<dyn AuthProvider>,
    factory: Arc<dyn AccountFactory>,
    state: RwLock<ManagerState>,
    // Serializes sign-in / sign-out / switch flows.
    flow: tokio::sync::Mutex<()>,
}

fn into_auth_error(err: SwapError) -> SwapError {
    match err {
        SwapError::Auth(_) => err,
        other => SwapError::Auth(other.to_string()),
    }
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthProvider>, factory: Arc<dyn AccountFactory>, chain_id: u64) -> Self {
        Self {
            auth,
            factory,
            state: RwLock::new(ManagerState { chain_id, epoch: 0, session: None }),
            flow: tokio::sync::Mutex::new(()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).chain_id
    }

    /// The live session, if any.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .session
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().map_or(false, |s| s.is_live())
    }

    /// Run the external auth flow and populate a new session.
    ///
    /// When the owner has no account yet, the counterfactual account address
    /// becomes the only account.
    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    pub async fn sign_in(&self) -> Result<Arc<Session>> {
        let _flow = self.flow.lock().await;
        self.sign_in_locked().await
    }

    async fn sign_in_locked(&self) -> Result<Arc<Session>> {
        self.teardown("re-authentication");
        let chain_id = self.chain_id();

        let grant = self.auth.sign_in(chain_id).await.map_err(|e| {
            warn!(error = %e, "sign-in rejected");
            into_auth_error(e)
        })?;

        let accounts = if grant.accounts.is_empty() {
            let account = self
                .factory
                .counterfactual_address(grant.owner, chain_id)
                .await
                .map_err(into_auth_error)?;
            info!(owner = %grant.owner, %account, "no deployed account, using counterfactual address");
            vec![account]
        } else {
            grant.accounts
        };

        let active = accounts[0];
        let session = self.install(|epoch| {
            Session::new(epoch, grant.owner, chain_id, accounts, active, grant.signer)
        });
        info!(owner = %session.owner, account = %active, epoch = session.epoch(), "signed in");
        Ok(session)
    }

    /// Clear the session and notify the provider.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let _flow = self.flow.lock().await;
        if self.teardown("sign-out") {
            if let Err(e) = self.auth.sign_out().await {
                warn!(error = %e, "provider sign-out failed");
            }
        }
        Ok(())
    }

    /// Tear down and re-create the session on another chain.
    ///
    /// Returns the new session when one existed before the switch.
    #[instrument(skip(self))]
    pub async fn switch_chain(&self, chain_id: u64) -> Result<Option<Arc<Session>>> {
        let _flow = self.flow.lock().await;
        let had_session = self.teardown("chain switch");
        self.state.write().unwrap_or_else(|e| e.into_inner()).chain_id = chain_id;
        info!(chain_id, "switched chain");
        if had_session {
            self.sign_in_locked().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Make another of the session's accounts active.
    ///
    /// The previous session epoch is closed so pollers bound to the old
    /// account stop.
    #[instrument(skip(self))]
    pub async fn select_account(&self, account: Address) -> Result<Arc<Session>> {
        let _flow = self.flow.lock().await;
        let current = self
            .current()
            .filter(|s| s.is_live())
            .ok_or_else(|| SwapError::Auth("not signed in".into()))?;
        if !current.accounts.contains(&account) {
            return Err(SwapError::Auth(format!("account {} not owned by session", account)));
        }
        if current.active_account == account {
            return Ok(current);
        }

        let signer = current.signer()?;
        self.teardown("account switch");
        let session = self.install(|epoch| {
            Session::new(
                epoch,
                current.owner,
                current.chain_id,
                current.accounts.clone(),
                account,
                signer,
            )
        });
        info!(%account, epoch = session.epoch(), "active account changed");
        Ok(session)
    }

    fn install(&self, build: impl FnOnce(u64) -> Arc<Session>) -> Arc<Session> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.epoch += 1;
        let session = build(state.epoch);
        state.session = Some(Arc::clone(&session));
        session
    }

    /// Close and drop the current session. Returns whether one existed.
    fn teardown(&self, reason: &str) -> bool {
        let previous = self.state.write().unwrap_or_else(|e| e.into_inner()).session.take();
        match previous {
            Some(session) => {
                session.close();
                info!(reason, epoch = session.epoch(), "session torn down");
                true
            }
            None => false,
        }
    }
}
