//! Claw CLI - run voucher ledger scenarios and scripts
//!
//! Every command runs against a fresh in-memory bank and ledger built from
//! the loaded configuration.
//!
//! # Usage
//!
//! ```bash
//! # Walk through the reference scenarios
//! claw demo
//!
//! # Execute an operation script and keep the audit trail
//! claw run crates/claw-cli/scripts/lifecycle.json --audit-out audit.json
//!
//! # Override configuration from the environment
//! CLAW__CUSTODY__ACCOUNT=vault CLAW__LOGGING__LEVEL=debug claw demo
//! ```

mod commands;
mod config;
mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{demo, run};
use crate::config::{LedgerConfig, LoggingConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Claw - bounded spending vouchers backed by a custodial balance
#[derive(Parser, Debug)]
#[command(name = "claw")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, global = true, env = "CLAW_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CLAW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, global = true, env = "CLAW_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reference voucher scenarios
    Demo {
        /// Run only this scenario (1-6)
        #[arg(short, long)]
        scenario: Option<usize>,
    },

    /// Execute a JSON operation script against a fresh ledger
    Run {
        /// Script file
        script: PathBuf,

        /// Write the audit journal to this file as JSON
        #[arg(long)]
        audit_out: Option<PathBuf>,

        /// Print the run report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut ledger_config = LedgerConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        ledger_config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        ledger_config.logging.format = format;
    }
    ledger_config.validate()?;

    init_logging(&ledger_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        custody = %ledger_config.custody.account,
        audit = ledger_config.audit.enabled,
        "starting claw"
    );

    match cli.command {
        Commands::Demo { scenario } => demo::run_demo(&ledger_config, scenario).await?,
        Commands::Run {
            script,
            audit_out,
            json,
        } => run::run_script(&ledger_config, &script, audit_out.as_deref(), json).await?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&ledger_config)?),
    }

    Ok(())
}

/// Initialize logging; output goes to stderr so reports on stdout stay parseable
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        _ => {
            subscriber
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "claw",
            "run",
            "script.json",
            "--audit-out",
            "audit.json",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Run {
                script,
                audit_out,
                json,
            } => {
                assert_eq!(script, PathBuf::from("script.json"));
                assert_eq!(audit_out, Some(PathBuf::from("audit.json")));
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
