//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → PayoutConfig (validated, immutable)
//!     → handed to lifecycle::startup to wire the engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AccountsConfig, BlockchainConfig, DispatchConfig, NotifierConfig, ObservabilityConfig,
    PayoutConfig, TokenConfig, WalletConfig,
};
