//! Ethereum payout engine.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ WalletService ──┬─ Immediate ─▶ TransferService ─▶ ChainClient ─▶ txid
//!                              │
//!                              └─ Queued ────▶ PaymentQueue
//!                                                   │ dispatch tick
//!                                                   ▼
//!                                              in-flight slot ─▶ ChainClient (receipt)
//!                                                   │ confirm tick
//!                                                   ▼
//!                                                Notifier ─▶ MessageBus
//! ```

use std::path::PathBuf;

use clap::Parser;

use eth_payout::config::load_config;
use eth_payout::lifecycle::{bootstrap, wait_for_signal};
use eth_payout::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "eth-payout")]
#[command(about = "Native ETH and ERC20 payout engine", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability);
    tracing::info!(config = %cli.config.display(), "eth-payout v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut runtime = bootstrap(config).await?;

    if let Some(mut rx) = runtime.notifications.take() {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                tracing::info!(topic = %message.topic, key = %message.key, payload = %message.payload, "Notification");
            }
        });
    }

    wait_for_signal().await;
    tracing::info!("Shutting down");
    runtime.stop().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
