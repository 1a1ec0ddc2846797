//! Build-and-broadcast, and the synchronous transfer path.

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use rust_decimal::Decimal;

use crate::blockchain::client::ChainClient;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::SignedTransaction;
use crate::blockchain::wallet::CredentialStore;
use crate::payments::types::{Asset, Payment, PaymentError, PaymentResult};

/// Signs and broadcasts payments.
#[derive(Clone)]
pub struct TransferService {
    builder: TxBuilder,
    chain: Arc<dyn ChainClient>,
    credentials: Arc<dyn CredentialStore>,
}

impl TransferService {
    pub fn new(
        builder: TxBuilder,
        chain: Arc<dyn ChainClient>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            builder,
            chain,
            credentials,
        }
    }

    pub fn builder(&self) -> &TxBuilder {
        &self.builder
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Sign `payment` and broadcast it. Does not modify the payment.
    pub async fn submit(&self, payment: &Payment) -> PaymentResult<TxHash> {
        let signed = self.sign(payment).await?;
        self.broadcast(payment, &signed).await
    }

    /// Broadcast a queued payment, signing it only on the first attempt.
    ///
    /// Retries resend the identical bytes, so a broadcast the node accepted
    /// without answering keeps its hash and nonce. The signature is dropped
    /// only once another transaction has consumed its nonce.
    pub async fn dispatch(&self, payment: &mut Payment) -> PaymentResult<TxHash> {
        let signed = match payment.signed() {
            Some(signed) => signed.clone(),
            None => {
                let signed = self.sign(payment).await?;
                payment.attach_signed(signed.clone());
                signed
            }
        };

        let result = self.broadcast(payment, &signed).await;
        if result.is_err() && self.nonce_taken_elsewhere(&signed).await {
            tracing::warn!(
                payment_id = %payment.id(),
                nonce = signed.nonce,
                tx_hash = %signed.tx_hash,
                "Nonce consumed by another transaction, payment will be re-signed"
            );
            payment.discard_signed();
        }
        result
    }

    async fn broadcast(&self, payment: &Payment, signed: &SignedTransaction) -> PaymentResult<TxHash> {
        let txid = match self.chain.broadcast(signed.raw.clone()).await {
            Ok(txid) => txid,
            Err(e) => match self.chain.is_known(signed.tx_hash).await {
                Ok(true) => {
                    tracing::warn!(
                        payment_id = %payment.id(),
                        tx_hash = %signed.tx_hash,
                        error = %e,
                        "Broadcast reported an error but the node has the transaction"
                    );
                    signed.tx_hash
                }
                _ => return Err(e.into()),
            },
        };

        if txid != signed.tx_hash {
            tracing::warn!(
                local = %signed.tx_hash,
                remote = %txid,
                "Node reported a different transaction hash"
            );
        }

        tracing::info!(
            payment_id = %payment.id(),
            from = %signed.from,
            to = %payment.to(),
            amount = %payment.amount(),
            unit = %payment.unit(),
            nonce = signed.nonce,
            txid = %txid,
            "Transaction broadcast"
        );
        Ok(txid)
    }

    /// True only when the chain confirms the nonce moved past `signed` and
    /// has never seen `signed` itself.
    async fn nonce_taken_elsewhere(&self, signed: &SignedTransaction) -> bool {
        match self.chain.nonce(signed.from).await {
            Ok(next) if next > signed.nonce => {
                matches!(self.chain.is_known(signed.tx_hash).await, Ok(false))
            }
            _ => false,
        }
    }

    async fn sign(&self, payment: &Payment) -> PaymentResult<SignedTransaction> {
        let signed = match payment.asset() {
            Asset::Native => {
                self.builder
                    .build_native_transfer(payment.credential(), payment.to(), payment.amount())
                    .await?
            }
            Asset::Token(token) => {
                self.builder
                    .build_token_transfer(
                        payment.credential(),
                        token.address,
                        payment.to(),
                        payment.amount(),
                        token.decimals,
                        token.gas_limit,
                    )
                    .await?
            }
        };
        Ok(signed)
    }

    /// Unlock `wallet_file` and pay `amount` of `asset` to `to`, blocking on the broadcast.
    ///
    /// Bypasses the payment queue entirely.
    pub async fn transfer(
        &self,
        wallet_file: &str,
        password: &str,
        to: Address,
        amount: Decimal,
        asset: Asset,
    ) -> PaymentResult<TxHash> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }
        let credential = self.credentials.load(wallet_file, password).await?;
        let payment = Payment::new(credential, to, amount, asset, "")?;
        self.submit(&payment).await
    }
}
