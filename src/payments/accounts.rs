//! Deposit account balances and persistence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::payments::types::{PaymentError, PaymentResult};

/// A deposit account the consolidation routine may sweep from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Keystore file name, relative to the keystore directory.
    pub wallet_file: String,
    /// Last known native balance in ETH.
    pub balance: Decimal,
}

/// Account and balance storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Accounts holding at least `min`, richest first.
    async fn find_by_min_balance(&self, min: Decimal) -> PaymentResult<Vec<Account>>;

    async fn find_by_address(&self, address: Address) -> PaymentResult<Option<Account>>;

    async fn update_balance(&self, address: Address, balance: Decimal) -> PaymentResult<()>;
}

/// In-memory account store with an optional JSON snapshot file.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    inner: Arc<DashMap<Address, Account>>,
    snapshot_path: Option<String>,
}

impl AccountBook {
    pub fn new(snapshot_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            snapshot_path,
        }
    }

    /// Load accounts from `path` if the file exists; start empty otherwise.
    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let book = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let accounts: HashMap<Address, Account> = serde_json::from_reader(reader)?;
            for (address, account) in accounts {
                book.inner.insert(address, account);
            }
            tracing::info!(accounts = book.inner.len(), path, "Loaded account snapshot");
        }
        Ok(book)
    }

    /// Write all accounts to the snapshot file. No-op without one.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let accounts: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &accounts)?;
        tracing::info!(accounts = accounts.len(), path = %path, "Saved account snapshot");
        Ok(())
    }

    /// Add or replace an account.
    pub fn insert(&self, account: Account) {
        self.inner.insert(account.address, account);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl AccountStore for AccountBook {
    async fn find_by_min_balance(&self, min: Decimal) -> PaymentResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .inner
            .iter()
            .filter(|r| r.value().balance >= min)
            .map(|r| r.value().clone())
            .collect();
        accounts.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.address.cmp(&b.address)));
        Ok(accounts)
    }

    async fn find_by_address(&self, address: Address) -> PaymentResult<Option<Account>> {
        Ok(self.inner.get(&address).map(|r| r.value().clone()))
    }

    async fn update_balance(&self, address: Address, balance: Decimal) -> PaymentResult<()> {
        let mut entry = self
            .inner
            .get_mut(&address)
            .ok_or(PaymentError::AccountNotFound(address))?;
        entry.balance = balance;
        Ok(())
    }
}
