//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, multiplier >= 1, gas limits sane)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PayoutConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::schema::PayoutConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check every section and collect all problems.
pub fn validate_config(config: &PayoutConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chain = &config.blockchain;
    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", "not a valid URL"));
    }
    for (i, failover) in chain.failover_urls.iter().enumerate() {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                &format!("blockchain.failover_urls[{}]", i),
                "not a valid URL",
            ));
        }
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new("blockchain.chain_id", "must be non-zero"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if chain.gas_price_multiplier < Decimal::ONE {
        errors.push(ValidationError::new(
            "blockchain.gas_price_multiplier",
            "must be >= 1",
        ));
    }
    if chain.native_gas_limit < 21_000 {
        errors.push(ValidationError::new(
            "blockchain.native_gas_limit",
            "must be at least 21000",
        ));
    }

    if config.wallet.keystore_path.trim().is_empty() {
        errors.push(ValidationError::new("wallet.keystore_path", "must not be empty"));
    }

    if let Some(token) = &config.token {
        if token.symbol.trim().is_empty() {
            errors.push(ValidationError::new("token.symbol", "must not be empty"));
        }
        if token.contract_address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "token.contract_address",
                "not a valid address",
            ));
        }
        if token.gas_limit == 0 {
            errors.push(ValidationError::new("token.gas_limit", "must be > 0"));
        }
    }

    if config.dispatch.interval_secs == 0 {
        errors.push(ValidationError::new("dispatch.interval_secs", "must be > 0"));
    }
    if config.dispatch.max_check_times == 0 {
        errors.push(ValidationError::new("dispatch.max_check_times", "must be > 0"));
    }
    if config.dispatch.max_broadcast_attempts == Some(0) {
        errors.push(ValidationError::new(
            "dispatch.max_broadcast_attempts",
            "must be > 0 when set",
        ));
    }

    if let Some(webhook) = &config.notifier.webhook_url {
        if webhook.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new("notifier.webhook_url", "not a valid URL"));
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", other),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&PayoutConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = PayoutConfig::default();
        config.blockchain.rpc_url = "not a url".to_string();
        config.blockchain.gas_price_multiplier = Decimal::new(9, 1);
        config.dispatch.interval_secs = 0;
        config.token = Some(TokenConfig {
            symbol: "USDT".to_string(),
            contract_address: "0x1234".to_string(),
            decimals: 6,
            gas_limit: 60_000,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "blockchain.rpc_url",
                "blockchain.gas_price_multiplier",
                "token.contract_address",
                "dispatch.interval_secs",
            ]
        );
    }

    #[test]
    fn test_zero_attempt_cap_rejected() {
        let mut config = PayoutConfig::default();
        config.dispatch.max_broadcast_attempts = Some(0);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "dispatch.max_broadcast_attempts");
    }
}
