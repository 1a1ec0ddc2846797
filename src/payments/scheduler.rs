//! Periodic driver for the dispatch and confirmation cycles.
//!
//! Each cycle is its own task on a fixed interval. A tick runs to completion
//! before that task polls its timer again, and late ticks are skipped rather
//! than replayed, so neither cycle is ever re-entered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::Shutdown;
use crate::payments::engine::PaymentEngine;

/// Handles of the two cycle tasks.
#[derive(Debug)]
pub struct Scheduler {
    pub dispatch: JoinHandle<()>,
    pub confirm: JoinHandle<()>,
}

impl Scheduler {
    /// Spawn both cycles. They stop when `shutdown` fires.
    pub fn spawn(
        engine: Arc<PaymentEngine>,
        period: Duration,
        shutdown: &Shutdown,
    ) -> Self {
        tracing::info!(period_secs = period.as_secs(), "Payment scheduler starting");

        let dispatch = {
            let engine = engine.clone();
            let shutdown = shutdown.subscribe();
            tokio::spawn(run_cycle("dispatch", period, shutdown, move || {
                let engine = engine.clone();
                async move {
                    engine.dispatch_tick().await;
                }
            }))
        };

        let confirm = {
            let shutdown = shutdown.subscribe();
            tokio::spawn(run_cycle("confirm", period, shutdown, move || {
                let engine = engine.clone();
                async move {
                    engine.confirm_tick().await;
                }
            }))
        };

        Self { dispatch, confirm }
    }

    /// Wait for both cycles to exit.
    pub async fn join(self) {
        if let Err(e) = self.dispatch.await {
            tracing::error!(error = %e, "Dispatch cycle task failed");
        }
        if let Err(e) = self.confirm.await {
            tracing::error!(error = %e, "Confirmation cycle task failed");
        }
    }
}

async fn run_cycle<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick().await;
            }
            _ = shutdown.recv() => {
                tracing::info!(cycle = name, "Cycle received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
