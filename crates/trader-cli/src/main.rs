//! Command-line interface for the market analysis scheduler
//!
//! ```bash
//! export GOOGLE_API_KEY="..."
//!
//! # Run every job on its schedule until Ctrl-C
//! cargo run -p trader-cli -- run --symbol BTC --symbol ETH
//!
//! # Run one job once and print its report
//! cargo run -p trader-cli -- tick analysis --symbol SOL
//!
//! # Print the indicator set of one symbol
//! cargo run -p trader-cli -- indicators BTC --interval 4h
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use trader_llm::AgentRegistry;
use trader_market::{BinanceClient, IndicatorEngine, KlineInterval, MarketDataGateway};
use trader_scheduler::{AnalysisScheduler, InMemoryStore, JobKind, SchedulerConfig, User};
use trader_utils::LogFormat;

/// Wallets seeded into the in-memory store, with their opening balance
const DEMO_USERS: &[(&str, Option<f64>)] = &[
    ("0x4f2a9c1e8b7d6a5f3e2d1c0b9a8f7e6d5c4b3a21", Some(10_000.0)),
    ("0x9b1d3f5a7c9e1b3d5f7a9c1e3b5d7f9a1c3e5b79", Some(2_500.0)),
    ("0x1e3b5d7f9a1c3e5b7d9f1a3c5e7b9d1f3a5c7e90", None),
];

#[derive(Parser, Debug)]
#[command(name = "trader-cli")]
#[command(about = "Scheduled technical analysis of tracked instruments", long_about = None)]
struct Cli {
    /// Log output format: pretty or json
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Run {
        #[command(flatten)]
        seed: Seed,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run a single job once and print its report
    Tick {
        /// price-sync, analysis or snapshot
        job: JobKind,

        #[command(flatten)]
        seed: Seed,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Fetch history for a symbol and print its indicators as JSON
    Indicators {
        /// Symbol, e.g. BTC or ETHUSDT
        symbol: String,

        /// Candle interval
        #[arg(long, default_value = "1h")]
        interval: KlineInterval,

        /// Number of candles
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },
}

/// Instruments to track
#[derive(Args, Debug)]
struct Seed {
    /// Symbol to track, repeatable
    #[arg(long = "symbol", default_values = ["BTC", "ETH", "SOL"])]
    symbols: Vec<String>,
}

/// Command-line overrides for environment configuration
#[derive(Args, Debug)]
struct Overrides {
    /// Agent model name
    #[arg(long)]
    model: Option<String>,

    /// Seconds between analysis cycles
    #[arg(long)]
    analysis_interval_secs: Option<u64>,

    /// Seconds between price syncs
    #[arg(long)]
    price_sync_interval_secs: Option<u64>,

    /// Upper bound on one agent call, in seconds
    #[arg(long)]
    provider_timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, mut config: SchedulerConfig) -> anyhow::Result<SchedulerConfig> {
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(secs) = self.analysis_interval_secs {
            config.analysis_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.price_sync_interval_secs {
            config.price_sync_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.provider_timeout_secs {
            config.provider_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    trader_utils::init_tracing_with(cli.log_format, "info");

    match cli.command {
        Command::Run { seed, overrides } => {
            let scheduler = build_scheduler(&seed, overrides).await?;
            run_until_ctrl_c(scheduler).await
        }
        Command::Tick {
            job,
            seed,
            overrides,
        } => {
            let scheduler = build_scheduler(&seed, overrides).await?;
            let report = scheduler.tick(job).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Indicators {
            symbol,
            interval,
            limit,
        } => {
            let market = BinanceClient::from_env()?;
            let bars = market.get_history(&symbol, interval, limit).await?;
            let indicators = IndicatorEngine::default().compute_bars(&bars);
            info!(symbol = %symbol, bars = bars.len(), "Indicators computed");
            println!("{}", serde_json::to_string_pretty(&indicators)?);
            Ok(())
        }
    }
}

async fn build_scheduler(
    seed: &Seed,
    overrides: Overrides,
) -> anyhow::Result<Arc<AnalysisScheduler>> {
    let config = overrides.apply(SchedulerConfig::from_env()?)?;
    let market = Arc::new(BinanceClient::from_env()?);
    let agents = AgentRegistry::from_env(&config.model)?;
    if agents.is_empty() {
        warn!("No agent configured, analysis cycles will fail per instrument");
    }

    let store = Arc::new(InMemoryStore::new());
    for (wallet, balance) in DEMO_USERS {
        store.add_user(User::new(*wallet), *balance).await;
    }

    let scheduler = Arc::new(AnalysisScheduler::new(
        market,
        Arc::new(agents),
        store,
        config,
    ));

    for symbol in &seed.symbols {
        if let Err(e) = scheduler.add_instrument(symbol).await {
            warn!(symbol = %symbol, error = %e, "Could not add instrument");
        }
    }
    Ok(scheduler)
}

async fn run_until_ctrl_c(scheduler: Arc<AnalysisScheduler>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested, waiting for in-flight jobs");
    shutdown_tx.send(true)?;

    handle.await??;
    Ok(())
}
