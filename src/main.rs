mod chain;
mod config;
mod display;
mod prompt;
mod rpc_manager;
mod transfer;
mod wallet;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::chain::AlloyClient;
use crate::config::Config;
use crate::prompt::{ParamOverrides, Prompter};
use crate::transfer::TransferService;
use crate::wallet::{parse_signers, KeyStore};

#[derive(Parser, Debug)]
#[clap(author, version, about = "EVM automatic transfer tool")]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "config.json")]
    config: String,

    /// Generate default config file
    #[clap(short, long)]
    init: bool,

    /// Private key file, one key per line (overrides keys_path)
    #[clap(short, long)]
    keys: Option<PathBuf>,

    /// Show source wallet addresses and balances, then exit
    #[clap(short, long)]
    show_wallets: bool,

    /// Stop after this many full cycles (0 runs until Ctrl-C)
    #[clap(long)]
    cycles: Option<u64>,

    /// Minimum amount per transfer (ETH)
    #[clap(long)]
    min_amount: Option<f64>,

    /// Maximum amount per transfer (ETH)
    #[clap(long)]
    max_amount: Option<f64>,

    /// Minimum delay after a transfer (minutes)
    #[clap(long)]
    min_delay: Option<f64>,

    /// Maximum delay after a transfer (minutes)
    #[clap(long)]
    max_delay: Option<f64>,

    /// Receiver wallets generated per source wallet
    #[clap(long)]
    wallets_per_source: Option<usize>,

    /// Transfers sent to each receiver
    #[clap(long)]
    tx_per_wallet: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ParamOverrides {
        ParamOverrides {
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            wallets_per_source: self.wallets_per_source,
            tx_per_wallet: self.tx_per_wallet,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// First Ctrl-C asks the loop to stop; a second one exits immediately.
fn spawn_stop_handler(stop: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Ctrl-C received, stopping after the current step (press again to force)");
        let _ = stop.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Forced exit");
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    if args.init {
        let config = Config::default();
        config.save(&args.config)?;
        println!("Default config generated at: {}", args.config);
        println!("Put source private keys in {}, one per line", config.keys_path.display());
        return Ok(());
    }

    // Load config
    let mut config = Config::load(&args.config)?;
    if let Some(keys) = &args.keys {
        config.keys_path = keys.clone();
    }

    println!("Using RPC endpoints: {}", config.rpc_urls.join(", "));
    info!("Chain id: {}", config.chain_id);

    let store = KeyStore::new(config.keys_path.clone());
    let secrets = store.load_or_collect(std::io::stdin().lock())?;
    let sources = parse_signers(&secrets)?;
    info!("Loaded {} source wallet(s) from {}", sources.len(), store.path().display());

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut transfer_service = TransferService::new(config, sources, AlloyClient, stop_rx)?;

    // Test RPC endpoints
    println!("Testing RPC endpoints...");
    transfer_service.test_rpc_endpoints().await;

    if args.show_wallets {
        transfer_service.show_wallets().await;
        return Ok(());
    }

    let params = Prompter::new(std::io::stdin().lock(), std::io::stdout())
        .transfer_params(&args.overrides())?;

    spawn_stop_handler(stop_tx);

    let started = Instant::now();
    transfer_service.start_transfers(&params, args.cycles).await?;
    println!("{}", display::summary_box(&transfer_service.stats(), started.elapsed()));

    Ok(())
}
