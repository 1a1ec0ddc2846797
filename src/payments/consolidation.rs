//! Sweeping deposit balances into one address.

use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::blockchain::transaction::{from_base_units, NATIVE_DECIMALS};
use crate::payments::accounts::{Account, AccountStore};
use crate::payments::transfer::TransferService;
use crate::payments::types::{Asset, PaymentError, PaymentResult};

/// Greedy multi-account sweep over the synchronous transfer path.
pub struct Consolidator {
    transfers: TransferService,
    accounts: Arc<dyn AccountStore>,
    deposit_password: String,
}

impl Consolidator {
    pub fn new(
        transfers: TransferService,
        accounts: Arc<dyn AccountStore>,
        deposit_password: impl Into<String>,
    ) -> Self {
        Self {
            transfers,
            accounts,
            deposit_password: deposit_password.into(),
        }
    }

    /// Move up to `total` ETH into `target` from accounts holding at least `min_balance`.
    ///
    /// Each candidate is tried at most once, leaving `fee` behind for gas.
    /// Returns the amount actually transferred, never more than `total`.
    pub async fn sweep(
        &self,
        target: Address,
        total: Decimal,
        fee: Decimal,
        min_balance: Decimal,
    ) -> PaymentResult<Decimal> {
        if total <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(total));
        }

        let candidates = self.accounts.find_by_min_balance(min_balance).await?;
        if candidates.is_empty() {
            return Err(PaymentError::NoEligibleAccounts(min_balance));
        }

        tracing::info!(
            target = %target,
            total = %total,
            fee = %fee,
            candidates = candidates.len(),
            "Starting sweep"
        );

        let mut transferred = Decimal::ZERO;
        for account in &candidates {
            if transferred >= total {
                break;
            }
            let amount = (account.balance - fee).min(total - transferred);
            if amount <= Decimal::ZERO {
                tracing::debug!(from = %account.address, balance = %account.balance, "Balance does not cover fee, skipping");
                continue;
            }

            match self
                .transfers
                .transfer(&account.wallet_file, &self.deposit_password, target, amount, Asset::Native)
                .await
            {
                Ok(txid) => {
                    transferred += amount;
                    tracing::info!(from = %account.address, amount = %amount, txid = %txid, "Swept account");
                    self.refresh_balance(account).await;
                }
                Err(e) => {
                    tracing::warn!(from = %account.address, amount = %amount, error = %e, "Sweep transfer failed, skipping account");
                }
            }
        }

        tracing::info!(target = %target, transferred = %transferred, total = %total, "Sweep finished");
        Ok(transferred)
    }

    async fn refresh_balance(&self, account: &Account) {
        let balance = match self.transfers.chain().balance(account.address).await {
            Ok(wei) => from_base_units(wei, NATIVE_DECIMALS),
            Err(e) => Err(e),
        };
        let result = match balance {
            Ok(balance) => self.accounts.update_balance(account.address, balance).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(address = %account.address, error = %e, "Failed to refresh balance after sweep");
        }
    }
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator").finish_non_exhaustive()
    }
}
