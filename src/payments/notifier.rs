//! Terminal status notifications.
//!
//! One JSON message per finished payment, published on a fixed topic:
//! `{"withdrawId": "...", "txid": "0x...", "status": 0}`.
//! Delivery is fire-and-forget; the bus owns retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::NotifierConfig;
use crate::observability::metrics;
use crate::payments::types::Payment;

/// Message bus delivery failure.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus closed")]
    Closed,
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A message as handed to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Outbound message transport.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;
}

/// In-process bus backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl ChannelBus {
    /// Create the bus and the receiving end for the consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        self.tx.send(message).map_err(|_| BusError::Closed)
    }
}

/// Bus that POSTs each message as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookBus {
    client: reqwest::Client,
    url: String,
}

impl WebhookBus {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BusError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BusError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MessageBus for WebhookBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let res = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| BusError::Delivery(e.to_string()))?;

        if !res.status().is_success() {
            return Err(BusError::Delivery(format!(
                "webhook returned status {}",
                res.status()
            )));
        }
        Ok(())
    }
}

/// Payload of a terminal status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawNotice {
    pub withdraw_id: String,
    pub txid: String,
    pub status: u8,
}

/// Publishes terminal statuses for finished payments.
pub struct Notifier {
    bus: Arc<dyn MessageBus>,
    topic: String,
    key: String,
}

impl Notifier {
    pub fn new(bus: Arc<dyn MessageBus>, config: &NotifierConfig) -> Self {
        Self {
            bus,
            topic: config.topic.clone(),
            key: config.key.clone(),
        }
    }

    /// Publish the payment's terminal status. Non-terminal payments are ignored.
    pub async fn notify(&self, payment: &Payment) {
        let status = payment.status();
        let Some(code) = status.code() else {
            tracing::warn!(payment_id = %payment.id(), "Refusing to notify non-terminal payment");
            return;
        };

        let notice = WithdrawNotice {
            withdraw_id: payment.business_id().to_string(),
            txid: payment.txid().map(|h| h.to_string()).unwrap_or_default(),
            status: code,
        };

        metrics::record_terminal(status.as_str());

        let result = match serde_json::to_string(&notice) {
            Ok(payload) => {
                self.bus
                    .publish(BusMessage {
                        topic: self.topic.clone(),
                        key: self.key.clone(),
                        payload,
                    })
                    .await
            }
            Err(e) => Err(BusError::from(e)),
        };

        match result {
            Ok(()) => tracing::info!(
                business_id = %notice.withdraw_id,
                txid = %notice.txid,
                status = code,
                "Payment status published"
            ),
            Err(e) => tracing::error!(
                business_id = %notice.withdraw_id,
                txid = %notice.txid,
                status = code,
                error = %e,
                "Failed to publish payment status"
            ),
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("topic", &self.topic)
            .field("key", &self.key)
            .finish()
    }
}
