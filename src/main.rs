mod clock;
mod config;
mod error;
mod exchange;
mod indicators;
mod ledger;
mod observer;
mod orchestrator;
mod risk;
mod safety;
mod strategies;
mod timeframe;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clock::SystemClock;
use config::{load_exchange_config, load_runtime_config};
use ledger::Ledger;
use observer::TracingObserver;
use orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "signal-engine")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Single-instrument crypto trading signal engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (without extension; resolved by the `config` crate)
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the orchestrator and run until interrupted
    Run,
    /// Print ledger summary aggregates
    Status,
    /// Load and validate the configuration file without starting anything
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime_config = load_runtime_config(&cli.config).context("loading runtime configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&runtime_config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::ValidateConfig => {
            info!(
                symbol = %runtime_config.instrument.symbol,
                trading_enabled = runtime_config.trading_enabled,
                "configuration is valid"
            );
            Ok(())
        }
        Commands::Status => {
            let ledger = Ledger::open(&runtime_config.ledger_path)
                .await
                .context("opening ledger")?;
            let summary = ledger.summary().await.context("reading ledger summary")?;
            println!("{summary:#?}");
            if let Some(position) = ledger
                .find_open_position(&runtime_config.instrument.symbol)
                .await
                .context("reading open position")?
            {
                println!("open position: {position:#?}");
            } else {
                println!("no open position for {}", runtime_config.instrument.symbol);
            }
            Ok(())
        }
        Commands::Run => {
            let exchange_config = if runtime_config.trading_enabled {
                Some(load_exchange_config().context("loading exchange credentials")?)
            } else {
                None
            };

            let observer = Arc::new(TracingObserver);
            let clock = Arc::new(SystemClock);

            let orchestrator = Orchestrator::build(runtime_config, exchange_config, observer, clock)
                .await
                .context("building orchestrator")?;

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
                shutdown.cancel();
            });

            orchestrator.run(cancel).await.context("running orchestrator")?;
            Ok(())
        }
    }
}
