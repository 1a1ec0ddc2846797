//! Payment types.

use alloy::primitives::{Address, TxHash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::blockchain::transaction::{to_base_units, NATIVE_DECIMALS};
use crate::blockchain::types::{BlockchainError, SignedTransaction, NATIVE_UNIT};
use crate::blockchain::wallet::Credential;
use crate::config::TokenConfig;

/// An ERC20 contract payments can be made in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenContract {
    /// Unit symbol (e.g., "USDT").
    pub symbol: String,
    /// Contract address; token transfers are sent here.
    pub address: Address,
    /// Declared decimal precision.
    pub decimals: u8,
    /// Gas limit for `transfer` calls.
    pub gas_limit: u64,
}

impl TryFrom<&TokenConfig> for TokenContract {
    type Error = PaymentError;

    fn try_from(config: &TokenConfig) -> Result<Self, Self::Error> {
        let address = config
            .contract_address
            .parse()
            .map_err(|e| PaymentError::InvalidToken(format!("{}: {}", config.contract_address, e)))?;
        Ok(Self {
            symbol: config.symbol.clone(),
            address,
            decimals: config.decimals,
            gas_limit: config.gas_limit,
        })
    }
}

/// What a payment moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    /// The chain's native coin.
    Native,
    /// An ERC20 token.
    Token(TokenContract),
}

impl Asset {
    /// Unit symbol for logs and notifications.
    pub fn unit(&self) -> &str {
        match self {
            Asset::Native => NATIVE_UNIT,
            Asset::Token(token) => &token.symbol,
        }
    }

    /// Precision amounts are encoded with.
    pub fn decimals(&self) -> u8 {
        match self {
            Asset::Native => NATIVE_DECIMALS,
            Asset::Token(token) => token.decimals,
        }
    }
}

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Queued or in flight.
    Pending,
    /// Receipt reported success.
    Confirmed,
    /// No successful receipt within the check ceiling.
    TimedOut,
    /// Dropped from the queue after too many failed broadcasts or an unrecoverable one.
    Abandoned,
}

impl PaymentStatus {
    /// Code published on the message bus for terminal statuses.
    pub fn code(self) -> Option<u8> {
        match self {
            PaymentStatus::Pending => None,
            PaymentStatus::Confirmed => Some(0),
            PaymentStatus::TimedOut => Some(1),
            PaymentStatus::Abandoned => Some(2),
        }
    }

    pub fn is_terminal(self) -> bool {
        self.code().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::TimedOut => "timed_out",
            PaymentStatus::Abandoned => "abandoned",
        }
    }
}

/// A transfer intent and its lifecycle record.
#[derive(Debug, Clone)]
pub struct Payment {
    id: Uuid,
    credential: Credential,
    to: Address,
    amount: Decimal,
    asset: Asset,
    business_id: String,
    txid: Option<TxHash>,
    status: PaymentStatus,
    broadcast_attempts: u32,
    signed: Option<SignedTransaction>,
}

impl Payment {
    /// Create a pending payment.
    ///
    /// `amount` must be positive and representable in the asset's precision.
    pub fn new(
        credential: Credential,
        to: Address,
        amount: Decimal,
        asset: Asset,
        business_id: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }
        to_base_units(amount, asset.decimals())?;
        Ok(Self {
            id: Uuid::new_v4(),
            credential,
            to,
            amount,
            asset,
            business_id: business_id.into(),
            txid: None,
            status: PaymentStatus::Pending,
            broadcast_attempts: 0,
            signed: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn from(&self) -> Address {
        self.credential.address()
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn unit(&self) -> &str {
        self.asset.unit()
    }

    pub fn business_id(&self) -> &str {
        &self.business_id
    }

    pub fn txid(&self) -> Option<TxHash> {
        self.txid
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn broadcast_attempts(&self) -> u32 {
        self.broadcast_attempts
    }

    /// Transaction signed for this payment and not yet superseded.
    pub fn signed(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }

    pub(crate) fn attach_signed(&mut self, signed: SignedTransaction) {
        self.signed = Some(signed);
    }

    pub(crate) fn discard_signed(&mut self) {
        self.signed = None;
    }

    /// Record the broadcast hash. Returns false if one was already assigned.
    pub(crate) fn assign_txid(&mut self, txid: TxHash) -> bool {
        if self.txid.is_some() {
            return false;
        }
        self.txid = Some(txid);
        true
    }

    pub(crate) fn record_failed_broadcast(&mut self) -> u32 {
        self.broadcast_attempts += 1;
        self.broadcast_attempts
    }

    pub(crate) fn resolve(&mut self, status: PaymentStatus) {
        self.status = status;
    }
}

/// Errors that can occur while creating or submitting payments.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Chain, signing or credential failure.
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    /// Amount is zero or negative.
    #[error("Payment amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// No token is configured, or its address is malformed.
    #[error("Invalid token configuration: {0}")]
    InvalidToken(String),

    /// The account store has no entry for the address.
    #[error("Account not found: {0}")]
    AccountNotFound(Address),

    /// No account holds enough balance to sweep from.
    #[error("No account with balance >= {0} available to sweep")]
    NoEligibleAccounts(Decimal),

    /// The account store failed.
    #[error("Account store error: {0}")]
    Store(String),
}

impl PaymentError {
    /// Whether the same submission may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Blockchain(e) if e.is_transient())
    }
}

/// Result type for payment operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn credential() -> Credential {
        Credential::from_private_key(TEST_PRIVATE_KEY).unwrap()
    }

    #[test]
    fn test_amount_must_be_positive() {
        let zero = Payment::new(credential(), Address::ZERO, Decimal::ZERO, Asset::Native, "w-1");
        assert!(matches!(zero, Err(PaymentError::InvalidAmount(_))));

        let negative = Payment::new(credential(), Address::ZERO, Decimal::NEGATIVE_ONE, Asset::Native, "w-1");
        assert!(negative.is_err());
    }

    #[test]
    fn test_amount_must_fit_precision() {
        let token = TokenContract {
            symbol: "USDT".to_string(),
            address: Address::ZERO,
            decimals: 6,
            gas_limit: 60_000,
        };
        let too_precise: Decimal = "1.0000001".parse().unwrap();
        let result = Payment::new(credential(), Address::ZERO, too_precise, Asset::Token(token.clone()), "w-1");
        assert!(matches!(result, Err(PaymentError::Blockchain(BlockchainError::Encoding(_)))));
        assert!(!result.unwrap_err().is_transient());

        let exact: Decimal = "1.000001".parse().unwrap();
        assert!(Payment::new(credential(), Address::ZERO, exact, Asset::Token(token), "w-1").is_ok());
        assert!(Payment::new(credential(), Address::ZERO, too_precise, Asset::Native, "w-1").is_ok());
    }

    #[test]
    fn test_txid_assigned_once() {
        let mut payment =
            Payment::new(credential(), Address::ZERO, Decimal::ONE, Asset::Native, "w-1").unwrap();
        assert!(payment.txid().is_none());

        let first = B256::repeat_byte(1);
        assert!(payment.assign_txid(first));
        assert!(!payment.assign_txid(B256::repeat_byte(2)));
        assert_eq!(payment.txid(), Some(first));
    }

    #[test]
    fn test_unit_follows_asset() {
        let token = TokenContract {
            symbol: "USDT".to_string(),
            address: Address::ZERO,
            decimals: 6,
            gas_limit: 60_000,
        };
        assert_eq!(Asset::Native.unit(), "ETH");
        assert_eq!(Asset::Token(token).unit(), "USDT");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PaymentStatus::Pending.code(), None);
        assert_eq!(PaymentStatus::Confirmed.code(), Some(0));
        assert_eq!(PaymentStatus::TimedOut.code(), Some(1));
        assert_eq!(PaymentStatus::Abandoned.code(), Some(2));
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_token_from_config() {
        let config = TokenConfig {
            symbol: "USDT".to_string(),
            contract_address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
            decimals: 6,
            gas_limit: 65_000,
        };
        let token = TokenContract::try_from(&config).unwrap();
        assert_eq!(token.decimals, 6);

        let bad = TokenConfig {
            contract_address: "nope".to_string(),
            ..config
        };
        assert!(matches!(TokenContract::try_from(&bad), Err(PaymentError::InvalidToken(_))));
    }
}
