//! Orchestrator configuration.
//!
//! Loaded from a TOML file; secrets may instead come from the environment:
//! - `SAFESWAP_SWAP_API_KEY`
//! - `SAFESWAP_RELAY_SPONSOR_KEY`
//! - `SAFESWAP_RPC_URL`

use std::fmt;
use std::path::Path;

use safeswap_chain::BalancePollerConfig;
use safeswap_relay::submitter::DEFAULT_MULTISEND;
use safeswap_relay::{RelayPolicy, TrackerConfig};
use safeswap_types::tokens::GNOSIS_CHAIN_ID;
use safeswap_types::{Address, Result, SwapError};
use serde::Deserialize;

use crate::debounce::DebounceConfig;
use crate::workflow::WorkflowConfig;

pub const ENV_SWAP_API_KEY: &str = "SAFESWAP_SWAP_API_KEY";
pub const ENV_RELAY_SPONSOR_KEY: &str = "SAFESWAP_RELAY_SPONSOR_KEY";
pub const ENV_RPC_URL: &str = "SAFESWAP_RPC_URL";

/// Allowed balance refresh period, in milliseconds.
const BALANCE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10_000..=15_000;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Chain-scoped swap API base, e.g. `.../swap/v5.2/100`.
    pub swap_api_url: String,
    pub swap_api_key: Option<String>,
    pub relay_url: String,
    pub sponsor_api_key: Option<String>,
    pub fee_token: Address,
    pub multisend_address: Address,
    pub slippage_bps: u32,
    pub http_timeout_ms: Option<u64>,
    pub poll_interval_ms: u64,
    pub max_polls: Option<u32>,
    pub balance_interval_ms: u64,
    pub quote_debounce_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chain_id: GNOSIS_CHAIN_ID,
            rpc_url: "https://rpc.gnosischain.com".into(),
            swap_api_url: format!("https://api.1inch.dev/swap/v5.2/{}", GNOSIS_CHAIN_ID),
            swap_api_key: None,
            relay_url: "https://relay.gelato.digital".into(),
            sponsor_api_key: None,
            fee_token: Address::ZERO,
            multisend_address: DEFAULT_MULTISEND,
            slippage_bps: 100,
            http_timeout_ms: None,
            poll_interval_ms: 4_000,
            max_polls: None,
            balance_interval_ms: 12_000,
            quote_debounce_ms: 1_000,
        }
    }
}

impl fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("OrchestratorConfig")
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("swap_api_url", &self.swap_api_url)
            .field("swap_api_key", &redact(&self.swap_api_key))
            .field("relay_url", &self.relay_url)
            .field("sponsor_api_key", &redact(&self.sponsor_api_key))
            .field("fee_token", &self.fee_token)
            .field("multisend_address", &self.multisend_address)
            .field("slippage_bps", &self.slippage_bps)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_polls", &self.max_polls)
            .field("balance_interval_ms", &self.balance_interval_ms)
            .field("quote_debounce_ms", &self.quote_debounce_ms)
            .finish()
    }
}

impl OrchestratorConfig {
    /// Read a TOML file, apply env overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SwapError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus env overrides, for running without a file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SwapError::Config(format!("invalid config: {}", e)))
    }

    /// Override secrets and the RPC endpoint from `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(ENV_SWAP_API_KEY) {
            self.swap_api_key = Some(key);
        }
        if let Some(key) = get(ENV_RELAY_SPONSOR_KEY) {
            self.sponsor_api_key = Some(key);
        }
        if let Some(url) = get(ENV_RPC_URL) {
            self.rpc_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(SwapError::Config("chain_id cannot be zero".into()));
        }
        for (name, url) in [
            ("rpc_url", &self.rpc_url),
            ("swap_api_url", &self.swap_api_url),
            ("relay_url", &self.relay_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SwapError::Config(format!("{} must be an http(s) URL, got {:?}", name, url)));
            }
        }
        if self.slippage_bps == 0 || self.slippage_bps > 5_000 {
            return Err(SwapError::Config(format!(
                "slippage_bps must be within 1..=5000, got {}",
                self.slippage_bps
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(SwapError::Config("poll_interval_ms cannot be zero".into()));
        }
        if self.max_polls == Some(0) {
            return Err(SwapError::Config("max_polls cannot be zero".into()));
        }
        if !BALANCE_INTERVAL_RANGE.contains(&self.balance_interval_ms) {
            return Err(SwapError::Config(format!(
                "balance_interval_ms must be within {:?}, got {}",
                BALANCE_INTERVAL_RANGE, self.balance_interval_ms
            )));
        }
        if self.quote_debounce_ms == 0 {
            return Err(SwapError::Config("quote_debounce_ms cannot be zero".into()));
        }
        if self.multisend_address == Address::ZERO {
            return Err(SwapError::Config("multisend_address cannot be zero".into()));
        }
        Ok(())
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval_ms: self.poll_interval_ms,
            max_polls: self.max_polls,
        }
    }

    pub fn poller_config(&self) -> BalancePollerConfig {
        BalancePollerConfig {
            interval_ms: self.balance_interval_ms,
            ..BalancePollerConfig::default()
        }
    }

    pub fn relay_policy(&self) -> RelayPolicy {
        RelayPolicy {
            sponsor_api_key: self.sponsor_api_key.clone(),
            fee_token: self.fee_token,
            multisend_address: self.multisend_address,
        }
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig { delay_ms: self.quote_debounce_ms }
    }

    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig { slippage_bps: self.slippage_bps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chain_id, 100);
        assert_eq!(config.tracker_config().poll_interval_ms, 4_000);
        assert_eq!(config.relay_policy().fee_token, Address::ZERO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            relay_url = "http://localhost:8080"
            slippage_bps = 50
            max_polls = 30
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.relay_url, "http://localhost:8080");
        assert_eq!(config.slippage_bps, 50);
        assert_eq!(config.tracker_config().max_polls, Some(30));
        assert_eq!(config.balance_interval_ms, 12_000);
    }

    #[test]
    fn test_env_overrides_secrets() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SWAP_API_KEY, "swap-secret"),
            (ENV_RELAY_SPONSOR_KEY, ""),
            (ENV_RPC_URL, "http://127.0.0.1:8545"),
        ]);
        let mut config = OrchestratorConfig {
            sponsor_api_key: Some("from-file".into()),
            ..OrchestratorConfig::default()
        };
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.swap_api_key.as_deref(), Some("swap-secret"));
        assert_eq!(config.sponsor_api_key.as_deref(), Some("from-file"));
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert!(!format!("{:?}", config).contains("swap-secret"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            OrchestratorConfig { balance_interval_ms: 5_000, ..Default::default() },
            OrchestratorConfig { slippage_bps: 0, ..Default::default() },
            OrchestratorConfig { relay_url: "relay.local".into(), ..Default::default() },
            OrchestratorConfig { max_polls: Some(0), ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(SwapError::Config(_))));
        }
    }

    #[test]
    fn test_unknown_toml_type_is_config_error() {
        let err = OrchestratorConfig::from_toml_str("chain_id = \"gnosis\"").unwrap_err();
        assert!(matches!(err, SwapError::Config(_)));
    }
}
