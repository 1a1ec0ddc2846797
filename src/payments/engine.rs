//! Dispatch and confirmation cycles.
//!
//! # State Machine
//! ```text
//! enqueue ──▶ queue ──dispatch_tick (broadcast ok)──▶ current ──confirm_tick──▶ notified
//!               ▲           │                             │
//!               └─ broadcast fails: stays at head         ├─ receipt success      → Confirmed (0)
//!                  (dead-lettered after the optional cap  └─ checks > ceiling     → TimedOut  (1)
//!                   or on a non-transient error)
//! ```
//!
//! A queued payment is signed once; retries resend the same bytes.
//!
//! At most one payment is in flight; nothing is dispatched while `current` is set.

use alloy::primitives::TxHash;

use crate::blockchain::types::ReceiptStatus;
use crate::config::DispatchConfig;
use crate::observability::metrics;
use crate::payments::notifier::Notifier;
use crate::payments::queue::{PaymentQueue, PaymentView, QueueSnapshot};
use crate::payments::transfer::TransferService;
use crate::payments::types::{Payment, PaymentStatus};

/// Result of one dispatch tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A payment is already in flight; nothing dispatched.
    InFlight,
    /// Queue empty.
    Idle,
    /// Head broadcast and installed as current.
    Dispatched(TxHash),
    /// Broadcast failed; head kept for the next tick.
    Retrying { attempts: u32 },
    /// Broadcast failed too often or could not be built; head moved to the dead-letter list.
    DeadLettered { attempts: u32 },
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::InFlight => "in_flight",
            DispatchOutcome::Idle => "idle",
            DispatchOutcome::Dispatched(_) => "dispatched",
            DispatchOutcome::Retrying { .. } => "retrying",
            DispatchOutcome::DeadLettered { .. } => "dead_lettered",
        }
    }
}

/// Result of one confirmation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Nothing in flight.
    Idle,
    /// Still waiting; `checks` so far for the current payment.
    Pending { checks: u32 },
    /// Receipt succeeded; slot cleared.
    Confirmed(TxHash),
    /// Check ceiling exceeded; slot cleared.
    TimedOut(TxHash),
}

/// Owns the payment queue and drives both cycles.
pub struct PaymentEngine {
    queue: PaymentQueue,
    transfers: TransferService,
    notifier: Notifier,
    max_check_times: u32,
    max_broadcast_attempts: Option<u32>,
}

impl PaymentEngine {
    pub fn new(transfers: TransferService, notifier: Notifier, config: &DispatchConfig) -> Self {
        Self {
            queue: PaymentQueue::new(),
            transfers,
            notifier,
            max_check_times: config.max_check_times,
            max_broadcast_attempts: config.max_broadcast_attempts,
        }
    }

    pub fn queue(&self) -> &PaymentQueue {
        &self.queue
    }

    pub fn transfers(&self) -> &TransferService {
        &self.transfers
    }

    /// Append a payment for asynchronous dispatch.
    pub async fn enqueue(&self, payment: Payment) {
        self.queue.enqueue(payment).await;
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot().await
    }

    /// Remove and return payments abandoned by the dispatch cycle.
    pub async fn drain_dead_letters(&self) -> Vec<PaymentView> {
        self.queue.drain_dead_letters().await
    }

    /// Broadcast the queue head if nothing is in flight.
    pub async fn dispatch_tick(&self) -> DispatchOutcome {
        let mut abandoned = None;
        let outcome = {
            let mut state = self.queue.lock().await;
            tracing::debug!(queue_len = state.queue_len(), "Dispatch cycle");

            if state.current().is_some() {
                DispatchOutcome::InFlight
            } else if let Some(head) = state.head_mut() {
                match self.transfers.dispatch(head).await {
                    Ok(txid) => {
                        if let Some(current) = state.promote_head(txid) {
                            tracing::info!(
                                payment_id = %current.id(),
                                business_id = %current.business_id(),
                                txid = %txid,
                                "Payment in flight"
                            );
                        }
                        DispatchOutcome::Dispatched(txid)
                    }
                    Err(e) => {
                        let attempts = state
                            .head_mut()
                            .map(Payment::record_failed_broadcast)
                            .unwrap_or_default();
                        // Non-transient errors arise before anything is sent and never clear.
                        let exhausted = !e.is_transient()
                            || self.max_broadcast_attempts.is_some_and(|max| attempts >= max);

                        tracing::warn!(
                            error = %e,
                            transient = e.is_transient(),
                            attempts,
                            exhausted,
                            "Broadcast failed"
                        );

                        if exhausted {
                            abandoned = state.dead_letter_head();
                            DispatchOutcome::DeadLettered { attempts }
                        } else {
                            DispatchOutcome::Retrying { attempts }
                        }
                    }
                }
            } else {
                DispatchOutcome::Idle
            }
        };

        if let Some(payment) = abandoned {
            match payment.signed() {
                Some(signed) => tracing::error!(
                    payment_id = %payment.id(),
                    business_id = %payment.business_id(),
                    attempts = payment.broadcast_attempts(),
                    tx_hash = %signed.tx_hash,
                    nonce = signed.nonce,
                    "Payment dead-lettered; its signed transaction may still be mined"
                ),
                None => tracing::error!(
                    payment_id = %payment.id(),
                    business_id = %payment.business_id(),
                    attempts = payment.broadcast_attempts(),
                    "Payment dead-lettered"
                ),
            }
            self.notifier.notify(&payment).await;
        }

        metrics::record_dispatch(outcome.label());
        outcome
    }

    /// Poll the receipt of the in-flight payment and resolve it if terminal.
    pub async fn confirm_tick(&self) -> ConfirmOutcome {
        let (outcome, finished) = {
            let mut state = self.queue.lock().await;
            let Some(txid) = state.current().and_then(Payment::txid) else {
                tracing::debug!("No payment awaiting confirmation");
                return ConfirmOutcome::Idle;
            };

            let checks = state.record_check();
            let receipt = match self.transfers.chain().receipt_status(txid).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(txid = %txid, checks, error = %e, "Receipt query failed, treating as pending");
                    ReceiptStatus::Pending
                }
            };

            if receipt == ReceiptStatus::Success {
                tracing::info!(txid = %txid, checks, "Payment confirmed");
                (ConfirmOutcome::Confirmed(txid), state.take_current().map(|p| (p, PaymentStatus::Confirmed)))
            } else if checks > self.max_check_times {
                tracing::warn!(
                    txid = %txid,
                    checks,
                    reverted = receipt == ReceiptStatus::Reverted,
                    "Payment not confirmed within check limit"
                );
                (ConfirmOutcome::TimedOut(txid), state.take_current().map(|p| (p, PaymentStatus::TimedOut)))
            } else {
                if receipt == ReceiptStatus::Reverted {
                    tracing::warn!(txid = %txid, checks, "Transaction reverted, waiting for check limit");
                } else {
                    tracing::debug!(txid = %txid, checks, "Payment still pending");
                }
                (ConfirmOutcome::Pending { checks }, None)
            }
        };

        if let Some((mut payment, status)) = finished {
            payment.resolve(status);
            self.notifier.notify(&payment).await;
        }
        outcome
    }
}

impl std::fmt::Debug for PaymentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentEngine")
            .field("max_check_times", &self.max_check_times)
            .field("max_broadcast_attempts", &self.max_broadcast_attempts)
            .field("notifier", &self.notifier)
            .finish()
    }
}
