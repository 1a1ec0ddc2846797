//! Entry points for callers: withdrawals, token transfers, balances and sweeps.

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use rust_decimal::Decimal;

use crate::blockchain::transaction::{from_base_units, NATIVE_DECIMALS};
use crate::config::WalletConfig;
use crate::payments::accounts::AccountStore;
use crate::payments::consolidation::Consolidator;
use crate::payments::engine::PaymentEngine;
use crate::payments::types::{Asset, Payment, PaymentError, PaymentResult, TokenContract};

/// How a payment is handed to the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMode {
    /// Sign and broadcast now; the caller gets the txid.
    Immediate,
    /// Enqueue for the dispatch cycle; the outcome arrives on the bus.
    Queued { business_id: String },
}

/// What a submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawReceipt {
    Broadcast(TxHash),
    Queued,
}

/// Wallet operations exposed to the API layer.
pub struct WalletService {
    engine: Arc<PaymentEngine>,
    accounts: Arc<dyn AccountStore>,
    consolidator: Consolidator,
    token: Option<TokenContract>,
    wallet: WalletConfig,
}

impl WalletService {
    pub fn new(
        engine: Arc<PaymentEngine>,
        accounts: Arc<dyn AccountStore>,
        token: Option<TokenContract>,
        wallet: WalletConfig,
    ) -> Self {
        let consolidator = Consolidator::new(
            engine.transfers().clone(),
            accounts.clone(),
            wallet.deposit_wallet_password.clone(),
        );
        Self {
            engine,
            accounts,
            consolidator,
            token,
            wallet,
        }
    }

    pub fn engine(&self) -> &Arc<PaymentEngine> {
        &self.engine
    }

    /// The configured token, if any.
    pub fn token(&self) -> PaymentResult<&TokenContract> {
        self.token
            .as_ref()
            .ok_or_else(|| PaymentError::InvalidToken("no token configured".to_string()))
    }

    /// Pay `amount` of `asset` from the withdraw wallet.
    pub async fn withdraw(
        &self,
        to: Address,
        amount: Decimal,
        asset: Asset,
        mode: SubmitMode,
    ) -> PaymentResult<WithdrawReceipt> {
        let wallet_file = self.wallet.withdraw_wallet.clone();
        let password = self.wallet.withdraw_wallet_password.clone();
        self.submit(&wallet_file, &password, to, amount, asset, mode).await
    }

    /// Pay the configured token from a deposit account.
    pub async fn transfer_token_from(
        &self,
        from: Address,
        to: Address,
        amount: Decimal,
        mode: SubmitMode,
    ) -> PaymentResult<WithdrawReceipt> {
        let asset = Asset::Token(self.token()?.clone());
        let account = self
            .accounts
            .find_by_address(from)
            .await?
            .ok_or(PaymentError::AccountNotFound(from))?;
        let password = self.wallet.deposit_wallet_password.clone();
        self.submit(&account.wallet_file, &password, to, amount, asset, mode).await
    }

    async fn submit(
        &self,
        wallet_file: &str,
        password: &str,
        to: Address,
        amount: Decimal,
        asset: Asset,
        mode: SubmitMode,
    ) -> PaymentResult<WithdrawReceipt> {
        let transfers = self.engine.transfers();
        match mode {
            SubmitMode::Immediate => {
                let txid = transfers.transfer(wallet_file, password, to, amount, asset).await?;
                Ok(WithdrawReceipt::Broadcast(txid))
            }
            SubmitMode::Queued { business_id } => {
                if amount <= Decimal::ZERO {
                    return Err(PaymentError::InvalidAmount(amount));
                }
                let credential = transfers.credentials().load(wallet_file, password).await?;
                let payment = Payment::new(credential, to, amount, asset, business_id)?;
                self.engine.enqueue(payment).await;
                Ok(WithdrawReceipt::Queued)
            }
        }
    }

    /// Read the on-chain balance of `address` and store it.
    pub async fn sync_balance(&self, address: Address) -> PaymentResult<Decimal> {
        let wei = self.engine.transfers().chain().balance(address).await?;
        let balance = from_base_units(wei, NATIVE_DECIMALS)?;
        self.accounts.update_balance(address, balance).await?;
        tracing::debug!(address = %address, balance = %balance, "Balance synced");
        Ok(balance)
    }

    /// Fee in ETH for one transfer of `asset` at the current gas price.
    pub async fn network_fee(&self, asset: &Asset) -> PaymentResult<Decimal> {
        let builder = self.engine.transfers().builder();
        let gas_limit = match asset {
            Asset::Native => builder.policy().native_gas_limit,
            Asset::Token(token) => token.gas_limit,
        };
        Ok(builder.network_fee(gas_limit).await?)
    }

    /// Sweep deposit accounts into `target`. See [`Consolidator::sweep`].
    pub async fn sweep(
        &self,
        target: Address,
        total: Decimal,
        fee: Decimal,
        min_balance: Decimal,
    ) -> PaymentResult<Decimal> {
        self.consolidator.sweep(target, total, fee, min_balance).await
    }
}

impl std::fmt::Debug for WalletService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletService")
            .field("engine", &self.engine)
            .field("token", &self.token)
            .field("wallet", &self.wallet)
            .finish()
    }
}
