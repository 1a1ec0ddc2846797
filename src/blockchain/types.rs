//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Native coin unit symbol.
pub const NATIVE_UNIT: &str = "ETH";

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Keystore could not be decrypted (wrong password or corrupt file).
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Keystore file does not exist.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// RPC connection or request failed on every provider.
    #[error("Chain unavailable: {0}")]
    ChainUnavailable(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Amount or calldata could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Transaction could not be signed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl BlockchainError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BlockchainError::ChainUnavailable(_)
                | BlockchainError::Timeout(_)
                | BlockchainError::GasPriceTooHigh { .. }
        )
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Receipt lookup result for a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Mined with a successful status.
    Success,
    /// No receipt yet.
    Pending,
    /// Mined but reverted.
    Reverted,
}

/// A signed, encoded transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// EIP-2718 encoded bytes.
    pub raw: alloy::primitives::Bytes,
    /// Hash of the signed transaction.
    pub tx_hash: TxHash,
    /// Sender address.
    pub from: Address,
    /// Nonce the transaction was signed with.
    pub nonce: u64,
}
