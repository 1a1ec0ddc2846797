//! Payment dispatch and confirmation.
//!
//! # Data Flow
//! ```text
//! WalletService::withdraw
//!     ├─ Immediate → transfer.rs (sign + broadcast) → txid to caller
//!     └─ Queued    → queue.rs → engine.rs dispatch_tick → current slot
//!                                 → engine.rs confirm_tick → notifier.rs
//!
//! consolidation.rs: accounts.rs candidates → transfer.rs, one attempt each
//! scheduler.rs: drives both ticks on a fixed period
//! ```

pub mod accounts;
pub mod consolidation;
pub mod engine;
pub mod notifier;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod transfer;
pub mod types;

pub use accounts::{Account, AccountBook, AccountStore};
pub use consolidation::Consolidator;
pub use engine::{ConfirmOutcome, DispatchOutcome, PaymentEngine};
pub use notifier::{BusError, BusMessage, ChannelBus, MessageBus, Notifier, WebhookBus, WithdrawNotice};
pub use queue::{DispatchState, PaymentQueue, PaymentView, QueueSnapshot};
pub use scheduler::Scheduler;
pub use service::{SubmitMode, WalletService, WithdrawReceipt};
pub use transfer::TransferService;
pub use types::{Asset, Payment, PaymentError, PaymentResult, PaymentStatus, TokenContract};
