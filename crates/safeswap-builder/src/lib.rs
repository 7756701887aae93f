//! Meta-transaction building for approvals and swaps.
//!
//! - Approval: zero or one ERC20 `approve` call, depending on the token and
//!   the current allowance
//! - Swap: exactly one executable call from the swap aggregator
//! - Quote: indicative output only, never reused for execution

pub mod swap_api;

use std::sync::Arc;

use alloy_sol_types::{sol, SolCall};
use safeswap_types::{Address, MetaTransaction, Result, SwapError, Token, U256};
use serde::Serialize;
use tracing::{debug, info};

pub use swap_api::{SwapApi, SwapApiClient};

sol! {
    function approve(address spender, uint256 amount) external returns (bool success);
}

/// How much the aggregator may spend.
///
/// A zero amount means "approve unlimited"; callers opt into that
/// explicitly through `from_amount` instead of it happening silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApprovalAmount {
    Exact(U256),
    Unlimited,
}

impl ApprovalAmount {
    pub fn from_amount(amount: U256) -> Self {
        if amount.is_zero() {
            ApprovalAmount::Unlimited
        } else {
            ApprovalAmount::Exact(amount)
        }
    }

    pub fn is_covered_by(&self, allowance: U256) -> bool {
        match self {
            ApprovalAmount::Exact(amount) => allowance >= *amount,
            ApprovalAmount::Unlimited => allowance == U256::MAX,
        }
    }
}

/// Parameters of an executable swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub src: Token,
    pub dst: Token,
    pub amount: U256,
    pub from: Address,
    pub slippage_bps: u32,
}

/// Turns approve/swap intents into meta-transactions.
pub struct MetaTxBuilder {
    api: Arc<dyn SwapApi>,
}

impl MetaTxBuilder {
    pub fn new(api: Arc<dyn SwapApi>) -> Self {
        Self { api }
    }

    /// Build the approval needed before swapping `amount` of `token`.
    ///
    /// Returns no transactions for the native asset or when the existing
    /// allowance already covers the amount; otherwise exactly one call to
    /// the token contract's `approve`.
    pub async fn build_approval(
        &self,
        token: &Token,
        amount: ApprovalAmount,
        owner: Address,
    ) -> Result<Vec<MetaTransaction>> {
        if token.is_native() {
            debug!(token = token.symbol, "native asset needs no approval");
            return Ok(Vec::new());
        }

        let allowance = self.api.allowance(token.address, owner).await?;
        if amount.is_covered_by(allowance) {
            debug!(token = token.symbol, %allowance, "existing allowance covers amount");
            return Ok(Vec::new());
        }

        let tx = self.api.approve_transaction(token.address, amount).await?;
        if tx.to != token.address {
            return Err(SwapError::Quote(format!(
                "approval targets {} instead of token {}",
                tx.to, token.address
            )));
        }
        if !tx.data.starts_with(&approveCall::SELECTOR) {
            return Err(SwapError::Quote("approval payload is not an approve call".into()));
        }

        info!(token = token.symbol, ?amount, %allowance, "approval required");
        Ok(vec![tx])
    }

    /// Fetch a fresh executable swap; any earlier quote is ignored.
    pub async fn build_swap(&self, params: &SwapParams) -> Result<MetaTransaction> {
        if params.amount.is_zero() {
            return Err(SwapError::InvalidAmount("swap amount must be positive".into()));
        }
        if params.src.address == params.dst.address {
            return Err(SwapError::Quote(format!("cannot swap {} for itself", params.src.symbol)));
        }
        let tx = self.api.swap_transaction(params).await?;
        if tx.to == Address::ZERO {
            return Err(SwapError::Quote("swap payload has no target".into()));
        }
        Ok(tx)
    }

    /// Indicative output amount for live feedback.
    pub async fn quote(&self, src: &Token, dst: &Token, amount: U256) -> Result<U256> {
        self.api.quote(src.address, dst.address, amount).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeswap_types::tokens::{USDC, WETH, XDAI};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ROUTER: Address = Address::repeat_byte(0x77);

    struct FakeApi {
        allowance: U256,
        approve_target: Option<Address>,
        calls: AtomicUsize,
        approvals: Mutex<Vec<ApprovalAmount>>,
    }

    impl FakeApi {
        fn with_allowance(allowance: U256) -> Self {
            Self {
                allowance,
                approve_target: None,
                calls: AtomicUsize::new(0),
                approvals: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SwapApi for FakeApi {
        async fn quote(&self, _src: Address, _dst: Address, amount: U256) -> Result<U256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(amount * U256::from(2u64))
        }

        async fn swap_transaction(&self, params: &SwapParams) -> Result<MetaTransaction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if params.dst == USDC {
                return Err(SwapError::Quote("no route".into()));
            }
            Ok(MetaTransaction::new(ROUTER, vec![0x12, 0xaa], U256::ZERO))
        }

        async fn approve_transaction(&self, token: Address, amount: ApprovalAmount) -> Result<MetaTransaction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.approvals.lock().unwrap().push(amount);
            let data = approveCall { spender: ROUTER, amount: U256::MAX }.abi_encode();
            Ok(MetaTransaction::new(self.approve_target.unwrap_or(token), data, U256::ZERO))
        }

        async fn allowance(&self, _token: Address, _owner: Address) -> Result<U256> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.allowance)
        }
    }

    #[tokio::test]
    async fn test_native_asset_never_needs_approval() {
        let api = Arc::new(FakeApi::with_allowance(U256::ZERO));
        let builder = MetaTxBuilder::new(api.clone());

        for amount in [ApprovalAmount::Unlimited, ApprovalAmount::Exact(U256::from(10u64))] {
            let txs = builder.build_approval(&XDAI, amount, Address::ZERO).await.unwrap();
            assert!(txs.is_empty());
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips_approval() {
        let api = Arc::new(FakeApi::with_allowance(U256::from(100u64)));
        let builder = MetaTxBuilder::new(api.clone());

        let txs = builder
            .build_approval(&WETH, ApprovalAmount::Exact(U256::from(100u64)), Address::ZERO)
            .await
            .unwrap();
        assert!(txs.is_empty());
        assert!(api.approvals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_allowance_builds_one_approve() {
        let api = Arc::new(FakeApi::with_allowance(U256::from(5u64)));
        let builder = MetaTxBuilder::new(api.clone());

        let txs = builder
            .build_approval(&WETH, ApprovalAmount::Exact(U256::from(10u64)), Address::ZERO)
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].to, WETH.address);
        assert!(txs[0].data.starts_with(&approveCall::SELECTOR));
    }

    #[tokio::test]
    async fn test_zero_amount_requests_unlimited_approval() {
        let api = Arc::new(FakeApi::with_allowance(U256::from(1_000_000u64)));
        let builder = MetaTxBuilder::new(api.clone());

        let amount = ApprovalAmount::from_amount(U256::ZERO);
        assert_eq!(amount, ApprovalAmount::Unlimited);
        let txs = builder.build_approval(&WETH, amount, Address::ZERO).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(*api.approvals.lock().unwrap(), vec![ApprovalAmount::Unlimited]);
    }

    #[tokio::test]
    async fn test_approval_for_wrong_contract_is_rejected() {
        let mut api = FakeApi::with_allowance(U256::ZERO);
        api.approve_target = Some(Address::repeat_byte(0x99));
        let builder = MetaTxBuilder::new(Arc::new(api));

        let err = builder
            .build_approval(&WETH, ApprovalAmount::Exact(U256::from(1u64)), Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Quote(_)));
    }

    #[tokio::test]
    async fn test_build_swap_surfaces_quote_error() {
        let builder = MetaTxBuilder::new(Arc::new(FakeApi::with_allowance(U256::ZERO)));
        let params = SwapParams {
            src: WETH,
            dst: USDC,
            amount: U256::from(1u64),
            from: Address::ZERO,
            slippage_bps: 100,
        };
        assert!(matches!(builder.build_swap(&params).await, Err(SwapError::Quote(_))));

        let ok = SwapParams { dst: XDAI, ..params.clone() };
        assert_eq!(builder.build_swap(&ok).await.unwrap().to, ROUTER);

        let zero = SwapParams { amount: U256::ZERO, ..ok };
        assert!(matches!(builder.build_swap(&zero).await, Err(SwapError::InvalidAmount(_))));
    }
}
