//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::PayoutConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `wallet.withdraw_wallet_password`.
pub const WITHDRAW_PASSWORD_ENV_VAR: &str = "PAYOUT_WITHDRAW_WALLET_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PayoutConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<PayoutConfig, ConfigError> {
    let mut config: PayoutConfig = toml::from_str(content)?;

    if let Ok(password) = std::env::var(WITHDRAW_PASSWORD_ENV_VAR) {
        config.wallet.withdraw_wallet_password = password;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
