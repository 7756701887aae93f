//! In-process stand-ins for the wallet provider, used by tests across the
//! workspace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use safeswap_types::{AccountCall, AccountSigner, Address, Result, SignedCall, SwapError};

use crate::{AccountFactory, AuthGrant, AuthProvider, Session};

/// Signer that echoes the call data back as the signed payload.
pub struct StaticSigner {
    owner: Address,
    reject: bool,
    signed: Mutex<Vec<AccountCall>>,
}

impl StaticSigner {
    pub fn new(owner: Address) -> Self {
        Self { owner, reject: false, signed: Mutex::new(Vec::new()) }
    }

    /// A signer whose user declines every signature request.
    pub fn rejecting(owner: Address) -> Self {
        Self { owner, reject: true, signed: Mutex::new(Vec::new()) }
    }

    pub fn signed(&self) -> Vec<AccountCall> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountSigner for StaticSigner {
    fn owner(&self) -> Address {
        self.owner
    }

    async fn sign_account_call(
        &self,
        account: Address,
        _chain_id: u64,
        call: &AccountCall,
    ) -> Result<SignedCall> {
        if self.reject {
            return Err(SwapError::Relay("user rejected signature".into()));
        }
        self.signed.lock().unwrap().push(call.clone());
        Ok(SignedCall { target: account, data: call.data.clone() })
    }
}

/// Auth provider that returns a fixed grant.
pub struct StaticAuth {
    owner: Address,
    accounts: Vec<Address>,
    reject: bool,
    sign_outs: AtomicUsize,
}

impl StaticAuth {
    pub fn new(owner: Address, accounts: Vec<Address>) -> Self {
        Self { owner, accounts, reject: false, sign_outs: AtomicUsize::new(0) }
    }

    pub fn rejecting() -> Self {
        Self { owner: Address::ZERO, accounts: vec![], reject: true, sign_outs: AtomicUsize::new(0) }
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn sign_in(&self, _chain_id: u64) -> Result<AuthGrant> {
        if self.reject {
            return Err(SwapError::Auth("user closed the login modal".into()));
        }
        Ok(AuthGrant {
            owner: self.owner,
            accounts: self.accounts.clone(),
            signer: Arc::new(StaticSigner::new(self.owner)),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory returning one fixed counterfactual address.
pub struct StaticFactory {
    address: Address,
    calls: AtomicUsize,
}

impl StaticFactory {
    pub fn new(address: Address) -> Self {
        Self { address, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountFactory for StaticFactory {
    async fn counterfactual_address(&self, _owner: Address, _chain_id: u64) -> Result<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.address)
    }
}

/// A live Gnosis-chain session for `account` with a `StaticSigner`.
pub fn test_session(account: Address) -> Arc<Session> {
    test_session_with_signer(account, Arc::new(StaticSigner::new(Address::repeat_byte(0xee))))
}

pub fn test_session_with_signer(account: Address, signer: Arc<dyn AccountSigner>) -> Arc<Session> {
    let owner = signer.owner();
    Session::new(1, owner, 100, vec![account], account, signer)
}
