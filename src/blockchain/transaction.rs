//! Transaction building and signing.
//!
//! # Responsibilities
//! - Fetch the sender nonce, then price gas, then sign (in that order)
//! - Encode ERC20 `transfer` calls against the token's declared precision
//! - Produce raw EIP-2718 bytes ready for broadcast

use std::sync::Arc;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, SignedTransaction};
use crate::blockchain::wallet::Credential;

sol! {
    /// Minimal ERC20 surface used for payouts.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Decimals of the native coin.
pub const NATIVE_DECIMALS: u8 = 18;

/// Gas pricing and limits applied to every transaction.
#[derive(Debug, Clone)]
pub struct GasPolicy {
    /// Chain ID for EIP-155 replay protection.
    pub chain_id: u64,
    /// Multiplier applied to the node's gas price (>= 1).
    pub price_multiplier: Decimal,
    /// Refuse to sign above this price.
    pub max_gas_price_gwei: Option<u64>,
    /// Gas limit for native transfers.
    pub native_gas_limit: u64,
}

/// Builds signed native and token transfers.
#[derive(Clone)]
pub struct TxBuilder {
    chain: Arc<dyn ChainClient>,
    policy: GasPolicy,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(chain: Arc<dyn ChainClient>, policy: GasPolicy) -> Self {
        Self { chain, policy }
    }

    pub fn policy(&self) -> &GasPolicy {
        &self.policy
    }

    /// Sign a plain value transfer of `amount` native coin to `to`.
    pub async fn build_native_transfer(
        &self,
        credential: &Credential,
        to: Address,
        amount: Decimal,
    ) -> BlockchainResult<SignedTransaction> {
        let value = to_base_units(amount, NATIVE_DECIMALS)?;
        let request = TransactionRequest::default()
            .with_to(to)
            .with_value(value);

        self.sign(credential, request, self.policy.native_gas_limit)
            .await
    }

    /// Sign an ERC20 `transfer(to, amount)` call against `contract`.
    ///
    /// The transaction is addressed to the contract; the payee only appears in calldata.
    pub async fn build_token_transfer(
        &self,
        credential: &Credential,
        contract: Address,
        to: Address,
        amount: Decimal,
        decimals: u8,
        gas_limit: u64,
    ) -> BlockchainResult<SignedTransaction> {
        let value = to_base_units(amount, decimals)?;
        let data = IERC20::transferCall { to, amount: value }.abi_encode();
        let request = TransactionRequest::default()
            .with_to(contract)
            .with_value(U256::ZERO)
            .with_input(Bytes::from(data));

        self.sign(credential, request, gas_limit).await
    }

    /// Current gas price in wei with the speed-up multiplier applied.
    pub async fn gas_price(&self) -> BlockchainResult<u128> {
        let base = self.chain.gas_price().await?;
        let adjusted = apply_multiplier(base, self.policy.price_multiplier)?;

        if let Some(max_gwei) = self.policy.max_gas_price_gwei {
            let current_gwei = adjusted / 1_000_000_000;
            if current_gwei > max_gwei as u128 {
                return Err(BlockchainError::GasPriceTooHigh {
                    current_gwei: current_gwei as u64,
                    max_gwei,
                });
            }
        }
        Ok(adjusted)
    }

    /// Fee in native coin for a transaction consuming `gas_limit` at today's price.
    pub async fn network_fee(&self, gas_limit: u64) -> BlockchainResult<Decimal> {
        let price = self.gas_price().await?;
        let fee_wei = U256::from(price) * U256::from(gas_limit);
        from_base_units(fee_wei, NATIVE_DECIMALS)
    }

    async fn sign(
        &self,
        credential: &Credential,
        request: TransactionRequest,
        gas_limit: u64,
    ) -> BlockchainResult<SignedTransaction> {
        let from = credential.address();
        let nonce = self.chain.nonce(from).await?;
        let gas_price = self.gas_price().await?;

        tracing::info!(
            from = %from,
            nonce,
            gas_price,
            gas_limit,
            "Signing transaction"
        );

        let request = request
            .with_from(from)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(gas_limit)
            .with_chain_id(self.policy.chain_id);

        let envelope = request
            .build(&credential.ethereum_wallet())
            .await
            .map_err(|e| BlockchainError::Signing(e.to_string()))?;

        Ok(SignedTransaction {
            raw: Bytes::from(envelope.encoded_2718()),
            tx_hash: *envelope.tx_hash(),
            from,
            nonce,
        })
    }
}

/// Scale a unit-denominated amount to integer base units.
pub fn to_base_units(amount: Decimal, decimals: u8) -> BlockchainResult<U256> {
    if amount <= Decimal::ZERO {
        return Err(BlockchainError::Encoding(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    let amount = amount.normalize();
    if amount.scale() > decimals as u32 {
        return Err(BlockchainError::Encoding(format!(
            "{} has more decimal places than the {} supported",
            amount, decimals
        )));
    }
    let parsed = parse_units(&amount.to_string(), decimals)
        .map_err(|e| BlockchainError::Encoding(format!("{} with {} decimals: {}", amount, decimals, e)))?;
    Ok(parsed.get_absolute())
}

/// Convert integer base units back into a unit-denominated amount.
pub fn from_base_units(value: U256, decimals: u8) -> BlockchainResult<Decimal> {
    let formatted = format_units(value, decimals)
        .map_err(|e| BlockchainError::Encoding(e.to_string()))?;
    Decimal::from_str(&formatted).map_err(|e| BlockchainError::Encoding(e.to_string()))
}

fn apply_multiplier(base: u128, multiplier: Decimal) -> BlockchainResult<u128> {
    let base = Decimal::try_from_i128_with_scale(base as i128, 0)
        .map_err(|e| BlockchainError::Encoding(format!("gas price {}: {}", base, e)))?;
    base.checked_mul(multiplier)
        .and_then(|price| price.trunc().to_u128())
        .ok_or_else(|| BlockchainError::Encoding("gas price overflow".to_string()))
}
