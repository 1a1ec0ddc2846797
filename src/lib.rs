//! Ethereum payout engine library.
//!
//! Native ETH and ERC20 payouts with a single-in-flight dispatch queue,
//! receipt polling with a check ceiling, and terminal status notifications.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod payments;

pub use config::PayoutConfig;
pub use lifecycle::{bootstrap, Runtime, Shutdown};
pub use payments::{Asset, PaymentEngine, SubmitMode, WalletService};
