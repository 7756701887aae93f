//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "safeswap")]
#[command(about = "Quote, inspect balances and track relayed swaps")]
#[command(version)]
pub struct Cli {
    /// TOML config file; defaults plus env overrides when omitted.
    #[arg(long, short, env = "SAFESWAP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the effective configuration (secrets redacted)
    Config,

    /// List the tokens known for the configured chain
    Tokens,

    /// Indicative output for swapping an amount
    Quote {
        /// Token sold, by symbol or address
        #[arg(long)]
        from: String,
        /// Token bought, by symbol or address
        #[arg(long)]
        to: String,
        /// Decimal amount of `from`, e.g. "1.5"
        #[arg(long)]
        amount: String,
    },

    /// One balance snapshot for an account
    Balances {
        /// Account address
        account: String,
    },

    /// Follow a relay task until it is executed or cancelled (Ctrl-C stops)
    Track {
        task_id: String,
        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote() {
        let cli = Cli::parse_from(["safeswap", "quote", "--from", "WETH", "--to", "xdai", "--amount", "0.5"]);
        match cli.command {
            Commands::Quote { from, to, amount } => {
                assert_eq!(from, "WETH");
                assert_eq!(to, "xdai");
                assert_eq!(amount, "0.5");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_track_with_global_config() {
        let cli = Cli::parse_from(["safeswap", "track", "0xabc", "--max-polls", "3", "--config", "swap.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("swap.toml")));
        assert!(matches!(cli.command, Commands::Track { ref task_id, max_polls: Some(3) } if task_id == "0xabc"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
