//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the payout engine.
//! All types derive Serde traits for deserialization from config files.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root configuration for the payout engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PayoutConfig {
    /// Chain RPC and gas pricing settings.
    pub blockchain: BlockchainConfig,

    /// Keystore locations and unlock passwords.
    pub wallet: WalletConfig,

    /// ERC20 token handled alongside the native coin, if any.
    pub token: Option<TokenConfig>,

    /// Dispatch and confirmation cycle settings.
    pub dispatch: DispatchConfig,

    /// Terminal status notification settings.
    pub notifier: NotifierConfig,

    /// Account balance snapshot settings.
    pub accounts: AccountsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Speed-up applied to the node's gas price (1.0 = as quoted, 1.2 = 20% faster).
    pub gas_price_multiplier: Decimal,

    /// Refuse to sign above this gas price (protection against spikes).
    pub max_gas_price_gwei: Option<u64>,

    /// Gas limit for plain native transfers.
    pub native_gas_limit: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            gas_price_multiplier: Decimal::new(12, 1),
            max_gas_price_gwei: None,
            native_gas_limit: 21_000,
        }
    }
}

/// Keystore configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Directory holding encrypted JSON keystore files.
    pub keystore_path: String,

    /// Keystore file name of the hot withdraw wallet.
    pub withdraw_wallet: String,

    /// Password of the withdraw wallet. Overridden by `PAYOUT_WITHDRAW_WALLET_PASSWORD`.
    pub withdraw_wallet_password: String,

    /// Password shared by the per-user deposit keystores.
    pub deposit_wallet_password: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keystore_path: "./keystore".to_string(),
            withdraw_wallet: String::new(),
            withdraw_wallet_password: String::new(),
            deposit_wallet_password: String::new(),
        }
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("keystore_path", &self.keystore_path)
            .field("withdraw_wallet", &self.withdraw_wallet)
            .field("withdraw_wallet_password", &"<redacted>")
            .field("deposit_wallet_password", &"<redacted>")
            .finish()
    }
}

/// ERC20 token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Unit symbol used on payments (e.g., "USDT").
    pub symbol: String,

    /// Token contract address.
    pub contract_address: String,

    /// Declared decimal precision of the token.
    #[serde(default = "default_token_decimals")]
    pub decimals: u8,

    /// Gas limit for `transfer` calls against this contract.
    #[serde(default = "default_token_gas_limit")]
    pub gas_limit: u64,
}

fn default_token_decimals() -> u8 {
    18
}

fn default_token_gas_limit() -> u64 {
    60_000
}

/// Dispatch and confirmation cycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Period of both cycles in seconds.
    pub interval_secs: u64,

    /// Confirmation checks before an in-flight payment is reported as timed out.
    pub max_check_times: u32,

    /// Failed broadcasts before the head payment is dead-lettered. Unset retries forever.
    pub max_broadcast_attempts: Option<u32>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            max_check_times: 100,
            max_broadcast_attempts: None,
        }
    }
}

/// Notifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Topic the terminal status messages are published on.
    pub topic: String,

    /// Message key (usually the coin name).
    pub key: String,

    /// Deliver messages by HTTP POST to this URL instead of the in-process channel.
    pub webhook_url: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            topic: "withdraw-notify".to_string(),
            key: "ETH".to_string(),
            webhook_url: None,
        }
    }
}

/// Account store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccountsConfig {
    /// JSON snapshot of deposit accounts, loaded at startup and saved on shutdown.
    pub snapshot_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
