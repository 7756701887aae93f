//! `safeswap` command-line entry point.

mod cli;

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use safeswap_ops::{Orchestrator, OrchestratorConfig};
use safeswap_session::SessionScope;
use safeswap_store::MemoryStore;
use safeswap_types::tokens::{find_token, tokens_for_chain};
use safeswap_types::{format_amount, parse_amount, Address, RelayPath, RelayTask, Token};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => OrchestratorConfig::from_env().context("building config from environment")?,
    };

    match cli.command {
        Commands::Config => {
            println!("{:#?}", config);
            Ok(())
        }
        Commands::Tokens => {
            for token in tokens_for_chain(config.chain_id) {
                println!("{:<6} {:<3} {} {}", token.symbol, token.decimals, token.address, token.name);
            }
            Ok(())
        }
        Commands::Quote { from, to, amount } => handle_quote(config, &from, &to, &amount).await,
        Commands::Balances { account } => handle_balances(config, &account).await,
        Commands::Track { task_id, max_polls } => handle_track(config, task_id, max_polls).await,
    }
}

/// Compact logs on stderr, filtered by `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("safeswap=info,warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr).compact())
        .with(env_filter)
        .init();
}

fn orchestrator(config: OrchestratorConfig) -> Result<Orchestrator> {
    Ok(Orchestrator::from_config(config, Arc::new(MemoryStore::new()))?)
}

fn token(chain_id: u64, query: &str) -> Result<Token> {
    find_token(chain_id, query).ok_or_else(|| anyhow!("unknown token {:?} on chain {}", query, chain_id))
}

#[instrument(skip(config))]
async fn handle_quote(config: OrchestratorConfig, from: &str, to: &str, amount: &str) -> Result<()> {
    let src = token(config.chain_id, from)?;
    let dst = token(config.chain_id, to)?;
    let amount_in = parse_amount(amount, src.decimals)?;
    if amount_in.is_zero() {
        bail!("amount must be positive");
    }

    let orchestrator = orchestrator(config)?;
    let amount_out = orchestrator.builder.quote(&src, &dst, amount_in).await?;
    println!(
        "{} {} -> {} {}",
        format_amount(amount_in, src.decimals),
        src.symbol,
        format_amount(amount_out, dst.decimals),
        dst.symbol
    );
    Ok(())
}

#[instrument(skip(config))]
async fn handle_balances(config: OrchestratorConfig, account: &str) -> Result<()> {
    let account: Address = account.parse().with_context(|| format!("invalid address {:?}", account))?;
    let orchestrator = orchestrator(config)?;
    let snapshot = orchestrator.poller.poll_once(account).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Close the tracking scope once `signal` fires.
///
/// `stop` stays alive when no signal handler can be installed, since a
/// dropped sender also closes the scope.
async fn watch_interrupt<F>(stop: watch::Sender<bool>, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("interrupted, stopping tracker");
            stop.send_replace(true);
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, tracking until done");
            std::future::pending::<()>().await;
            drop(stop);
        }
    }
}

#[instrument(skip(config))]
async fn handle_track(mut config: OrchestratorConfig, task_id: String, max_polls: Option<u32>) -> Result<()> {
    if max_polls.is_some() {
        config.max_polls = max_polls;
    }
    let chain_id = config.chain_id;
    let orchestrator = orchestrator(config)?;

    let (stop, scope) = SessionScope::detached(0);
    tokio::spawn(watch_interrupt(stop, tokio::signal::ctrl_c()));

    // The fee path is unknown for a task submitted elsewhere.
    let task = RelayTask::pending(task_id, chain_id, RelayPath::SelfFunded);
    let done = orchestrator.tracker.track(task, &scope).await?;
    println!("{}", serde_json::to_string_pretty(&done)?);
    Ok(())
}
