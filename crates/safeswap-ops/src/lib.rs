//! End-to-end orchestration: approve, swap, track.
//!
//! Wires the builder, relay client, tracker, balance poller and store from
//! one `OrchestratorConfig`, and exposes the swap workflow controller and
//! the live quote debouncer.

pub mod config;
pub mod debounce;
pub mod workflow;

use std::sync::Arc;

use safeswap_builder::{MetaTxBuilder, SwapApiClient};
use safeswap_chain::{BalancePoller, ChainReader, JsonRpcReader};
use safeswap_relay::{RelayClient, RelayHttpClient, RelayService, TaskTracker};
use safeswap_store::TaskStore;
use safeswap_types::tokens::tokens_for_chain;
use safeswap_types::{Result, SwapError};
use tracing::info;

pub use config::OrchestratorConfig;
pub use debounce::{DebounceConfig, QuoteDebouncer, QuoteDisplay};
pub use workflow::{
    RunOutcome, StepAction, SwapController, SwapPhase, SwapRequest, SwapStart, WorkflowConfig, WorkflowRun,
    WorkflowStep,
};

/// All components for one chain, sharing clients and the store.
pub struct Orchestrator {
    config: OrchestratorConfig,
    pub chain: Arc<dyn ChainReader>,
    pub relay: Arc<dyn RelayService>,
    pub builder: Arc<MetaTxBuilder>,
    pub tracker: Arc<TaskTracker>,
    pub poller: Arc<BalancePoller>,
    pub controller: Arc<SwapController>,
    pub store: Arc<dyn TaskStore>,
}

impl Orchestrator {
    /// Build HTTP-backed components from a validated config.
    pub fn from_config(config: OrchestratorConfig, store: Arc<dyn TaskStore>) -> Result<Self> {
        config.validate()?;
        let tokens = tokens_for_chain(config.chain_id);
        if tokens.is_empty() {
            return Err(SwapError::Config(format!("no tokens known for chain {}", config.chain_id)));
        }

        let chain: Arc<dyn ChainReader> = Arc::new(JsonRpcReader::new(&config.rpc_url, config.http_timeout_ms));
        let relay: Arc<dyn RelayService> = Arc::new(RelayHttpClient::new(&config.relay_url, config.http_timeout_ms));
        let swap_api = SwapApiClient::new(&config.swap_api_url, config.swap_api_key.clone(), config.http_timeout_ms);
        let builder = Arc::new(MetaTxBuilder::new(Arc::new(swap_api)));

        let tracker = Arc::new(TaskTracker::new(Arc::clone(&relay), Arc::clone(&store), config.tracker_config()));
        let relayer = Arc::new(RelayClient::new(Arc::clone(&relay), Arc::clone(&chain), config.relay_policy()));
        let poller = Arc::new(BalancePoller::new(Arc::clone(&chain), tokens, config.poller_config()));
        let controller = Arc::new(SwapController::new(
            Arc::clone(&builder),
            relayer,
            tracker.clone(),
            Arc::clone(&store),
            config.workflow_config(),
        ));

        info!(chain_id = config.chain_id, relay = %config.relay_url, "orchestrator ready");
        Ok(Self { config, chain, relay, builder, tracker, poller, controller, store })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// A debouncer for one quote input.
    pub fn quote_debouncer(&self) -> QuoteDebouncer {
        QuoteDebouncer::new(Arc::clone(&self.builder), self.config.debounce_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeswap_session::testing::test_session;
    use safeswap_store::{MemoryStore, RunStatus};
    use safeswap_types::tokens::{WETH, XDAI};
    use safeswap_types::{Address, TaskState, U256};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_from_config_rejects_unknown_chain() {
        let config = OrchestratorConfig { chain_id: 1, ..OrchestratorConfig::default() };
        let result = Orchestrator::from_config(config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(SwapError::Config(_))));
    }

    #[test]
    fn test_from_config_wires_tracker_config() {
        let config = OrchestratorConfig { max_polls: Some(5), ..OrchestratorConfig::default() };
        let orchestrator = Orchestrator::from_config(config, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(orchestrator.tracker.config().max_polls, Some(5));
        assert_eq!(orchestrator.poller.tokens().len(), 4);
    }

    #[tokio::test]
    async fn test_sufficient_allowance_relays_only_the_swap() {
        let account = Address::repeat_byte(0xac);
        let tx_hash = format!("0x{}", "cd".repeat(32));

        let swap_api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/approve/allowance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowance": "1000000000" })))
            .expect(1)
            .mount(&swap_api)
            .await;
        Mock::given(method("GET"))
            .and(path("/approve/transaction"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&swap_api)
            .await;
        Mock::given(method("GET"))
            .and(path("/swap"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tx": { "to": "0x1111111254eeb25477b68fb85ed929f73a960582", "data": "0x12aa3caf", "value": "0" }
            })))
            .expect(1)
            .mount(&swap_api)
            .await;

        let rpc = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_getCode" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x6080"
            })))
            .mount(&rpc)
            .await;

        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/relays/v2/sponsored-call"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "taskId": "0xswap" })))
            .expect(1)
            .mount(&relay)
            .await;
        Mock::given(method("POST"))
            .and(path("/relays/v2/call-with-sync-fee"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&relay)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/status/0xswap"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task": { "taskState": "ExecSuccess", "transactionHash": tx_hash }
            })))
            .mount(&relay)
            .await;

        let config = OrchestratorConfig {
            rpc_url: rpc.uri(),
            swap_api_url: swap_api.uri(),
            relay_url: relay.uri(),
            sponsor_api_key: Some("sponsor".into()),
            poll_interval_ms: 10,
            max_polls: Some(50),
            ..OrchestratorConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::from_config(config, store.clone()).unwrap();
        let session = test_session(account);

        let start = orchestrator
            .controller
            .swap(&session, SwapRequest { src: WETH, dst: XDAI, amount: U256::from(1_000u64) })
            .await;
        let SwapStart::Finished(run) = start else { panic!("swap was ignored") };

        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].action, StepAction::Swap);
        assert!(matches!(run.outcome, RunOutcome::Success { tx_hash: Some(_) }));
        assert!(matches!(orchestrator.controller.phase(), SwapPhase::Succeeded { tx_hash: Some(_) }));

        let task = store.get_task("0xswap").await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::ExecSuccess);
        assert_eq!(store.list_runs(None).await.unwrap()[0].status, RunStatus::Succeeded);
    }
}
