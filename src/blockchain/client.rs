//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoint (primary + failovers)
//! - Query nonce, gas price, balances and receipts
//! - Broadcast signed raw transactions
//! - Bound every call with a timeout so a stalled node cannot hold the payment lock

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::TransportResult;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ReceiptStatus,
};
use crate::observability::metrics;

/// Chain operations the payment engine depends on.
///
/// Network I/O and RPC-level retries are the implementation's concern.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next nonce (pending transaction count) for `address`.
    async fn nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Base gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Submit a signed raw transaction; returns its hash.
    async fn broadcast(&self, raw: Bytes) -> BlockchainResult<TxHash>;

    /// Receipt state for a previously broadcast transaction.
    async fn receipt_status(&self, tx_hash: TxHash) -> BlockchainResult<ReceiptStatus>;

    /// Native balance in wei.
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// Whether the node has seen `tx_hash`, pending or mined.
    async fn is_known(&self, tx_hash: TxHash) -> BlockchainResult<bool>;
}

/// JSON-RPC chain client with failover support.
#[derive(Clone)]
pub struct RpcChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Configuration.
    config: BlockchainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl RpcChainClient {
    /// Create a new chain client.
    ///
    /// An unreachable node or chain ID mismatch is logged, not fatal: the
    /// cycles keep retrying once the node comes back.
    pub async fn connect(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::ChainUnavailable(format!(
                "Invalid RPC URL '{}': {}",
                config.rpc_url, e
            ))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url))
                as Arc<dyn Provider + Send + Sync>,
        );

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>,
                ),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config,
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %client.config.rpc_url,
                chain_id = client.config.chain_id,
                providers = client.providers.len(),
                "Chain client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Chain client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = self
            .call("get chain id", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Run `op` against each provider in order until one answers in time.
    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> BlockchainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut all_timed_out = true;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    all_timed_out = false;
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }

        metrics::record_rpc_failure(op);
        if all_timed_out {
            Err(BlockchainError::Timeout(self.config.rpc_timeout_secs))
        } else {
            Err(BlockchainError::ChainUnavailable(format!(
                "All RPC providers failed to {}",
                op
            )))
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.call("get nonce", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.call("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn broadcast(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        self.call("broadcast", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    async fn receipt_status(&self, tx_hash: TxHash) -> BlockchainResult<ReceiptStatus> {
        let receipt = self
            .call("get receipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;

        Ok(match receipt {
            None => ReceiptStatus::Pending,
            Some(r) if r.status() => ReceiptStatus::Success,
            Some(_) => ReceiptStatus::Reverted,
        })
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.call("get balance", |p| async move { p.get_balance(address).await })
            .await
    }

    async fn is_known(&self, tx_hash: TxHash) -> BlockchainResult<bool> {
        let tx = self
            .call("get transaction", |p| async move {
                p.get_transaction_by_hash(tx_hash).await
            })
            .await?;
        Ok(tx.is_some())
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
