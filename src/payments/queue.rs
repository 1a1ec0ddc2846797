//! FIFO payment queue and the in-flight slot.
//!
//! Queue, current payment and check counter live in one [`DispatchState`]
//! behind a single async mutex. The dispatch and confirmation cycles both take
//! that lock for the whole tick, so they never mutate the slot concurrently.

use std::collections::VecDeque;
use std::sync::Arc;

use alloy::primitives::TxHash;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::observability::metrics;
use crate::payments::types::{Payment, PaymentStatus};

/// Queue, in-flight slot and check counter.
#[derive(Debug, Default)]
pub struct DispatchState {
    queue: VecDeque<Payment>,
    current: Option<Payment>,
    check_count: u32,
    dead_letters: Vec<PaymentView>,
}

impl DispatchState {
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn head_mut(&mut self) -> Option<&mut Payment> {
        self.queue.front_mut()
    }

    pub fn current(&self) -> Option<&Payment> {
        self.current.as_ref()
    }

    pub fn check_count(&self) -> u32 {
        self.check_count
    }

    pub fn dead_letters(&self) -> &[PaymentView] {
        &self.dead_letters
    }

    /// Hand the dead-lettered payments to the caller and forget them.
    pub fn drain_dead_letters(&mut self) -> Vec<PaymentView> {
        std::mem::take(&mut self.dead_letters)
    }

    pub(crate) fn push_back(&mut self, payment: Payment) {
        self.queue.push_back(payment);
        metrics::set_queue_depth(self.queue.len());
    }

    /// Move the head into the in-flight slot with `txid` and reset the counter.
    ///
    /// Refuses (returns None) while another payment is in flight.
    pub(crate) fn promote_head(&mut self, txid: TxHash) -> Option<&Payment> {
        if self.current.is_some() {
            return None;
        }
        let mut payment = self.queue.pop_front()?;
        payment.assign_txid(txid);
        self.current = Some(payment);
        self.check_count = 0;
        metrics::set_queue_depth(self.queue.len());
        self.current.as_ref()
    }

    /// Count one confirmation check against the in-flight payment.
    pub(crate) fn record_check(&mut self) -> u32 {
        self.check_count += 1;
        self.check_count
    }

    /// Clear the in-flight slot.
    pub(crate) fn take_current(&mut self) -> Option<Payment> {
        self.current.take()
    }

    /// Move the head to the dead-letter list, marked abandoned.
    ///
    /// Only a view is retained; the payment itself, credential included, is
    /// returned to the caller.
    pub(crate) fn dead_letter_head(&mut self) -> Option<Payment> {
        let mut payment = self.queue.pop_front()?;
        payment.resolve(PaymentStatus::Abandoned);
        self.dead_letters.push(PaymentView::from(&payment));
        metrics::set_queue_depth(self.queue.len());
        Some(payment)
    }
}

/// Lightweight view of a payment for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub business_id: String,
    pub to: String,
    pub amount: Decimal,
    pub unit: String,
    pub txid: Option<TxHash>,
    pub broadcast_attempts: u32,
    pub status: PaymentStatus,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id(),
            business_id: payment.business_id().to_string(),
            to: payment.to().to_string(),
            amount: payment.amount(),
            unit: payment.unit().to_string(),
            txid: payment.txid(),
            broadcast_attempts: payment.broadcast_attempts(),
            status: payment.status(),
        }
    }
}

/// Point-in-time copy of the dispatch state.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub queued: Vec<PaymentView>,
    pub current: Option<PaymentView>,
    pub check_count: u32,
    pub dead_letters: Vec<PaymentView>,
}

impl QueueSnapshot {
    /// Business ids in dispatch order.
    pub fn queued_ids(&self) -> Vec<&str> {
        self.queued.iter().map(|p| p.business_id.as_str()).collect()
    }
}

/// Shared handle to the dispatch state.
#[derive(Debug, Clone, Default)]
pub struct PaymentQueue {
    state: Arc<Mutex<DispatchState>>,
}

impl PaymentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payment to the tail. Duplicates are kept as independent payments.
    pub async fn enqueue(&self, payment: Payment) {
        tracing::info!(
            payment_id = %payment.id(),
            business_id = %payment.business_id(),
            to = %payment.to(),
            amount = %payment.amount(),
            unit = %payment.unit(),
            "Payment queued"
        );
        self.state.lock().await.push_back(payment);
    }

    /// Exclusive access for one cycle tick.
    pub async fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            queued: state.queue.iter().map(PaymentView::from).collect(),
            current: state.current.as_ref().map(PaymentView::from),
            check_count: state.check_count,
            dead_letters: state.dead_letters.clone(),
        }
    }

    /// Remove and return every dead-lettered payment.
    pub async fn drain_dead_letters(&self) -> Vec<PaymentView> {
        self.state.lock().await.drain_dead_letters()
    }
}
