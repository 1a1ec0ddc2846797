//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Keystore directory (encrypted JSON)
//!     → wallet.rs (unlock credential)
//!     → transaction.rs (nonce → gas price → sign)
//!     → client.rs (broadcast, receipt polling, with timeouts)
//! ```
//!
//! # Security Constraints
//! - Never log private keys or passwords
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{ChainClient, RpcChainClient};
pub use transaction::{GasPolicy, TxBuilder};
pub use types::{BlockchainError, BlockchainResult, ReceiptStatus, SignedTransaction, NATIVE_UNIT};
pub use wallet::{Credential, CredentialStore, KeystoreDirectory};
