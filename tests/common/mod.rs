//! Shared fakes for the payout integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use eth_payout::blockchain::{
    BlockchainError, BlockchainResult, ChainClient, Credential, CredentialStore, GasPolicy,
    ReceiptStatus, TxBuilder,
};
use eth_payout::config::{DispatchConfig, NotifierConfig};
use eth_payout::payments::{
    Asset, BusMessage, ChannelBus, Notifier, Payment, PaymentEngine, TransferService,
    WithdrawNotice,
};

/// Anvil's first two dev accounts.
pub const WITHDRAW_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEPOSIT_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const GAS_PRICE_WEI: u128 = 1_000_000_000;

/// Chain fake whose broadcast and receipt answers are scripted per test.
///
/// Like a node's mempool it rejects a transaction it already holds and one
/// whose nonce is already used. A single nonce is shared by every sender.
#[derive(Default)]
pub struct ScriptedChain {
    nonce: AtomicU64,
    nonce_script: Mutex<VecDeque<BlockchainError>>,
    broadcast_script: Mutex<VecDeque<BlockchainResult<()>>>,
    lost_replies: AtomicUsize,
    known: Mutex<HashSet<TxHash>>,
    known_errors: AtomicUsize,
    receipts: Mutex<HashMap<TxHash, ReceiptStatus>>,
    receipt_errors: AtomicUsize,
    receipt_delays: Mutex<VecDeque<Duration>>,
    active_receipts: AtomicUsize,
    max_active_receipts: AtomicUsize,
    balances: Mutex<HashMap<Address, U256>>,
    broadcasts: Mutex<Vec<Bytes>>,
    receipt_queries: AtomicUsize,
}

impl ScriptedChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next broadcast with `error`. Unscripted broadcasts succeed.
    pub fn fail_next_broadcast(&self, error: BlockchainError) {
        self.broadcast_script.lock().unwrap().push_back(Err(error));
    }

    /// Accept the next broadcast but answer it with a timeout.
    pub fn lose_next_reply(&self) {
        self.lost_replies.fetch_add(1, Ordering::SeqCst);
    }

    /// Fail the next `n` transaction lookups.
    pub fn fail_known_queries(&self, n: usize) {
        self.known_errors.store(n, Ordering::SeqCst);
    }

    /// Fail the next nonce query with `error`.
    pub fn fail_next_nonce(&self, error: BlockchainError) {
        self.nonce_script.lock().unwrap().push_back(error);
    }

    /// Hold the next receipt query for `delay` before answering.
    pub fn delay_next_receipt(&self, delay: Duration) {
        self.receipt_delays.lock().unwrap().push_back(delay);
    }

    /// Highest number of receipt queries seen running at once.
    pub fn max_concurrent_receipts(&self) -> usize {
        self.max_active_receipts.load(Ordering::SeqCst)
    }

    pub fn set_receipt(&self, txid: TxHash, status: ReceiptStatus) {
        self.receipts.lock().unwrap().insert(txid, status);
    }

    /// Fail the next `n` receipt queries.
    pub fn fail_receipts(&self, n: usize) {
        self.receipt_errors.store(n, Ordering::SeqCst);
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.balances.lock().unwrap().insert(address, wei);
    }

    /// Raw transactions accepted so far.
    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn receipt_queries(&self) -> usize {
        self.receipt_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn nonce(&self, _address: Address) -> BlockchainResult<u64> {
        if let Some(e) = self.nonce_script.lock().unwrap().pop_front() {
            return Err(e);
        }
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(GAS_PRICE_WEI)
    }

    async fn broadcast(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        if let Some(Err(e)) = self.broadcast_script.lock().unwrap().pop_front() {
            return Err(e);
        }
        let txid = keccak256(&raw);
        if self.known.lock().unwrap().contains(&txid) {
            return Err(BlockchainError::ChainUnavailable("already known".into()));
        }
        let mut buf: &[u8] = raw.as_ref();
        let tx = TxEnvelope::decode_2718(&mut buf)
            .map_err(|e| BlockchainError::Encoding(e.to_string()))?;
        if tx.nonce() < self.nonce.load(Ordering::SeqCst) {
            return Err(BlockchainError::ChainUnavailable("nonce too low".into()));
        }

        self.nonce.fetch_add(1, Ordering::SeqCst);
        self.known.lock().unwrap().insert(txid);
        self.broadcasts.lock().unwrap().push(raw);

        if take_one(&self.lost_replies) {
            return Err(BlockchainError::Timeout(10));
        }
        Ok(txid)
    }

    async fn is_known(&self, tx_hash: TxHash) -> BlockchainResult<bool> {
        if take_one(&self.known_errors) {
            return Err(BlockchainError::ChainUnavailable("connection reset".into()));
        }
        Ok(self.known.lock().unwrap().contains(&tx_hash))
    }

    async fn receipt_status(&self, tx_hash: TxHash) -> BlockchainResult<ReceiptStatus> {
        self.receipt_queries.fetch_add(1, Ordering::SeqCst);
        let active = self.active_receipts.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_receipts.fetch_max(active, Ordering::SeqCst);

        let delay = self.receipt_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = if take_one(&self.receipt_errors) {
            Err(BlockchainError::Timeout(10))
        } else {
            Ok(self
                .receipts
                .lock()
                .unwrap()
                .get(&tx_hash)
                .copied()
                .unwrap_or(ReceiptStatus::Pending))
        };
        self.active_receipts.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

/// Decrement `counter` if it is positive; true when it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Credential store holding unlocked keys in memory, keyed by wallet file.
#[derive(Default)]
pub struct FixedCredentialStore {
    wallets: HashMap<String, (String, Credential)>,
}

impl FixedCredentialStore {
    pub fn with_wallet(mut self, wallet_file: &str, password: &str, private_key: &str) -> Self {
        let credential = Credential::from_private_key(private_key).unwrap();
        self.wallets
            .insert(wallet_file.to_string(), (password.to_string(), credential));
        self
    }
}

#[async_trait]
impl CredentialStore for FixedCredentialStore {
    async fn load(&self, wallet_file: &str, password: &str) -> BlockchainResult<Credential> {
        match self.wallets.get(wallet_file) {
            None => Err(BlockchainError::CredentialNotFound(wallet_file.to_string())),
            Some((expected, _)) if expected != password => {
                Err(BlockchainError::Authorization(wallet_file.to_string()))
            }
            Some((_, credential)) => Ok(credential.clone()),
        }
    }
}

pub fn withdraw_credentials() -> FixedCredentialStore {
    FixedCredentialStore::default().with_wallet("withdraw.json", "secret", WITHDRAW_KEY)
}

pub fn gas_policy() -> GasPolicy {
    GasPolicy {
        chain_id: 31337,
        price_multiplier: Decimal::ONE,
        max_gas_price_gwei: None,
        native_gas_limit: 21_000,
    }
}

pub fn transfer_service(chain: Arc<ScriptedChain>, credentials: FixedCredentialStore) -> TransferService {
    let builder = TxBuilder::new(chain.clone(), gas_policy());
    TransferService::new(builder, chain, Arc::new(credentials))
}

/// Engine wired to `chain` with a channel bus; returns the bus receiver.
pub fn engine(
    chain: Arc<ScriptedChain>,
    dispatch: DispatchConfig,
) -> (Arc<PaymentEngine>, mpsc::UnboundedReceiver<BusMessage>) {
    engine_with_credentials(chain, withdraw_credentials(), dispatch)
}

pub fn engine_with_credentials(
    chain: Arc<ScriptedChain>,
    credentials: FixedCredentialStore,
    dispatch: DispatchConfig,
) -> (Arc<PaymentEngine>, mpsc::UnboundedReceiver<BusMessage>) {
    let (bus, rx) = ChannelBus::new();
    let notifier = Notifier::new(Arc::new(bus), &NotifierConfig::default());
    let engine = PaymentEngine::new(transfer_service(chain, credentials), notifier, &dispatch);
    (Arc::new(engine), rx)
}

pub fn dispatch_config(max_check_times: u32, max_broadcast_attempts: Option<u32>) -> DispatchConfig {
    DispatchConfig {
        interval_secs: 1,
        max_check_times,
        max_broadcast_attempts,
    }
}

/// Native payment from the withdraw key.
pub fn payment(business_id: &str, amount: &str) -> Payment {
    let credential = Credential::from_private_key(WITHDRAW_KEY).unwrap();
    Payment::new(
        credential,
        Address::repeat_byte(0x42),
        amount.parse().unwrap(),
        Asset::Native,
        business_id,
    )
    .unwrap()
}

/// Drain every notice published so far.
pub fn drain_notices(rx: &mut mpsc::UnboundedReceiver<BusMessage>) -> Vec<WithdrawNotice> {
    let mut notices = Vec::new();
    while let Ok(message) = rx.try_recv() {
        notices.push(serde_json::from_str(&message.payload).unwrap());
    }
    notices
}
