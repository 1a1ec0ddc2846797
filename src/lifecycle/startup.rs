//! Startup orchestration.
//!
//! Subsystems are built in dependency order: chain client, credentials,
//! notification bus, account store, then the engine and its scheduler.
//! Any construction error is fatal.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::blockchain::{BlockchainError, GasPolicy, KeystoreDirectory, RpcChainClient, TxBuilder};
use crate::config::PayoutConfig;
use crate::lifecycle::Shutdown;
use crate::payments::{
    AccountBook, BusError, BusMessage, ChannelBus, MessageBus, Notifier, PaymentEngine,
    PaymentError, Scheduler, TokenContract, TransferService, WalletService, WebhookBus,
};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Chain client: {0}")]
    Blockchain(#[from] BlockchainError),
    #[error("Payment setup: {0}")]
    Payment(#[from] PaymentError),
    #[error("Notification bus: {0}")]
    Bus(#[from] BusError),
    #[error("Account snapshot: {0}")]
    Accounts(#[from] std::io::Error),
}

/// A running payout engine.
pub struct Runtime {
    pub service: Arc<WalletService>,
    pub accounts: AccountBook,
    pub scheduler: Scheduler,
    pub shutdown: Shutdown,
    /// Messages of the in-process bus; `None` when a webhook is configured.
    pub notifications: Option<mpsc::UnboundedReceiver<BusMessage>>,
}

impl Runtime {
    /// Stop both cycles, wait for them, then persist account balances.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        self.scheduler.join().await;
        self.accounts.save_to_file()
    }
}

/// Build every subsystem from `config` and start the cycles.
pub async fn bootstrap(config: PayoutConfig) -> Result<Runtime, StartupError> {
    let chain = Arc::new(RpcChainClient::connect(config.blockchain.clone()).await?);

    let policy = GasPolicy {
        chain_id: config.blockchain.chain_id,
        price_multiplier: config.blockchain.gas_price_multiplier,
        max_gas_price_gwei: config.blockchain.max_gas_price_gwei,
        native_gas_limit: config.blockchain.native_gas_limit,
    };
    let builder = TxBuilder::new(chain.clone(), policy);
    let credentials = Arc::new(KeystoreDirectory::new(&config.wallet.keystore_path));
    let transfers = TransferService::new(builder, chain, credentials);

    let (bus, notifications) = match &config.notifier.webhook_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.blockchain.rpc_timeout_secs);
            let bus = WebhookBus::new(url.clone(), timeout)?;
            (Arc::new(bus) as Arc<dyn MessageBus>, None)
        }
        None => {
            let (bus, rx) = ChannelBus::new();
            (Arc::new(bus) as Arc<dyn MessageBus>, Some(rx))
        }
    };
    let notifier = Notifier::new(bus, &config.notifier);

    let accounts = match &config.accounts.snapshot_path {
        Some(path) => AccountBook::load_from_file(path)?,
        None => AccountBook::new(None),
    };

    let token = config
        .token
        .as_ref()
        .map(TokenContract::try_from)
        .transpose()?;

    let engine = Arc::new(PaymentEngine::new(transfers, notifier, &config.dispatch));
    let service = Arc::new(WalletService::new(
        engine.clone(),
        Arc::new(accounts.clone()),
        token,
        config.wallet.clone(),
    ));

    let shutdown = Shutdown::new();
    let scheduler = Scheduler::spawn(
        engine,
        Duration::from_secs(config.dispatch.interval_secs),
        &shutdown,
    );

    tracing::info!(
        chain_id = config.blockchain.chain_id,
        interval_secs = config.dispatch.interval_secs,
        max_check_times = config.dispatch.max_check_times,
        token = config.token.as_ref().map(|t| t.symbol.as_str()).unwrap_or("none"),
        accounts = accounts.len(),
        "Payout engine started"
    );

    Ok(Runtime {
        service,
        accounts,
        scheduler,
        shutdown,
        notifications,
    })
}
