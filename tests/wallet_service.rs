//! Synchronous transfers, sweeps and the wallet service entry points.

use std::sync::Arc;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

use eth_payout::blockchain::BlockchainError;
use eth_payout::config::WalletConfig;
use eth_payout::payments::{
    Account, AccountBook, AccountStore, Asset, PaymentError, SubmitMode, TokenContract,
    WalletService, WithdrawReceipt,
};

mod common;
use common::{
    dispatch_config, engine_with_credentials, transfer_service, withdraw_credentials,
    FixedCredentialStore, ScriptedChain, DEPOSIT_KEY, WITHDRAW_KEY,
};

fn d(value: &str) -> Decimal {
    value.parse().unwrap()
}

fn usdt() -> TokenContract {
    TokenContract {
        symbol: "USDT".to_string(),
        address: Address::repeat_byte(0xdd),
        decimals: 6,
        gas_limit: 60_000,
    }
}

fn wallet_config() -> WalletConfig {
    WalletConfig {
        keystore_path: "./keystore".to_string(),
        withdraw_wallet: "withdraw.json".to_string(),
        withdraw_wallet_password: "secret".to_string(),
        deposit_wallet_password: "deposit".to_string(),
    }
}

fn deposit_credentials() -> FixedCredentialStore {
    withdraw_credentials()
        .with_wallet("a.json", "deposit", DEPOSIT_KEY)
        .with_wallet("b.json", "deposit", WITHDRAW_KEY)
        .with_wallet("c.json", "deposit", DEPOSIT_KEY)
}

fn account(byte: u8, wallet_file: &str, balance: &str) -> Account {
    Account {
        address: Address::repeat_byte(byte),
        wallet_file: wallet_file.to_string(),
        balance: d(balance),
    }
}

fn service(chain: Arc<ScriptedChain>, accounts: AccountBook, token: Option<TokenContract>) -> WalletService {
    let (engine, _rx) = engine_with_credentials(chain, deposit_credentials(), dispatch_config(100, None));
    WalletService::new(engine, Arc::new(accounts), token, wallet_config())
}

fn decode(raw: &[u8]) -> TxEnvelope {
    let mut buf = raw;
    TxEnvelope::decode_2718(&mut buf).unwrap()
}

#[tokio::test]
async fn test_sync_transfer_distinguishes_errors() {
    let chain = ScriptedChain::new();
    let transfers = transfer_service(chain.clone(), withdraw_credentials());
    let to = Address::repeat_byte(0x42);

    let bad_password = transfers
        .transfer("withdraw.json", "wrong", to, Decimal::ONE, Asset::Native)
        .await
        .unwrap_err();
    assert!(matches!(bad_password, PaymentError::Blockchain(BlockchainError::Authorization(_))));
    assert!(!bad_password.is_transient());

    let missing = transfers
        .transfer("nobody.json", "secret", to, Decimal::ONE, Asset::Native)
        .await
        .unwrap_err();
    assert!(matches!(missing, PaymentError::Blockchain(BlockchainError::CredentialNotFound(_))));

    chain.fail_next_broadcast(BlockchainError::ChainUnavailable("connection refused".into()));
    let unavailable = transfers
        .transfer("withdraw.json", "secret", to, Decimal::ONE, Asset::Native)
        .await
        .unwrap_err();
    assert!(matches!(unavailable, PaymentError::Blockchain(BlockchainError::ChainUnavailable(_))));
    assert!(unavailable.is_transient());

    let txid = transfers
        .transfer("withdraw.json", "secret", to, Decimal::ONE, Asset::Native)
        .await
        .unwrap();
    assert_eq!(chain.broadcasts().len(), 1);
    assert_eq!(*decode(&chain.broadcasts()[0]).tx_hash(), txid);
}

#[tokio::test]
async fn test_sync_transfer_rejects_non_positive_amount() {
    let chain = ScriptedChain::new();
    let transfers = transfer_service(chain.clone(), withdraw_credentials());

    let result = transfers
        .transfer("withdraw.json", "secret", Address::ZERO, Decimal::ZERO, Asset::Native)
        .await;
    assert!(matches!(result, Err(PaymentError::InvalidAmount(_))));
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_sweep_stops_at_total() {
    let chain = ScriptedChain::new();
    chain.set_balance(Address::repeat_byte(1), U256::from(10_000_000_000_000_000u64));
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "a.json", "1.0"));
    accounts.insert(account(2, "b.json", "0.8"));
    accounts.insert(account(3, "c.json", "0.3"));
    let service = service(chain.clone(), accounts.clone(), None);

    let target = Address::repeat_byte(0x99);
    let transferred = service.sweep(target, d("1.5"), d("0.01"), d("0.1")).await.unwrap();

    assert_eq!(transferred, d("1.5"));
    let broadcasts = chain.broadcasts();
    assert_eq!(broadcasts.len(), 2);

    let first = decode(&broadcasts[0]);
    assert_eq!(first.to(), Some(target));
    assert_eq!(first.value(), U256::from(990_000_000_000_000_000u64));
    let second = decode(&broadcasts[1]);
    assert_eq!(second.value(), U256::from(510_000_000_000_000_000u64));

    // Swept account refreshed from chain, untouched account unchanged.
    let a = accounts.find_by_address(Address::repeat_byte(1)).await.unwrap().unwrap();
    assert_eq!(a.balance, d("0.01"));
    let c = accounts.find_by_address(Address::repeat_byte(3)).await.unwrap().unwrap();
    assert_eq!(c.balance, d("0.3"));
}

#[tokio::test]
async fn test_sweep_skips_failures_and_stays_within_total() {
    let chain = ScriptedChain::new();
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "missing.json", "2.0"));
    accounts.insert(account(2, "b.json", "0.5"));
    accounts.insert(account(3, "c.json", "0.005"));
    let service = service(chain.clone(), accounts, None);

    let transferred = service
        .sweep(Address::repeat_byte(0x99), d("5"), d("0.01"), d("0.001"))
        .await
        .unwrap();

    // Missing keystore skipped, dust below the fee skipped, one real transfer.
    assert_eq!(transferred, d("0.49"));
    assert!(transferred <= d("5"));
    assert_eq!(chain.broadcasts().len(), 1);
}

#[tokio::test]
async fn test_sweep_without_candidates() {
    let chain = ScriptedChain::new();
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "a.json", "0.05"));
    let service = service(chain.clone(), accounts, None);

    let result = service
        .sweep(Address::repeat_byte(0x99), d("1"), d("0.01"), d("0.1"))
        .await;
    assert!(matches!(result, Err(PaymentError::NoEligibleAccounts(_))));
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_withdraw_modes() {
    let chain = ScriptedChain::new();
    let service = service(chain.clone(), AccountBook::new(None), None);
    let to = Address::repeat_byte(0x42);

    let immediate = service
        .withdraw(to, d("0.25"), Asset::Native, SubmitMode::Immediate)
        .await
        .unwrap();
    assert!(matches!(immediate, WithdrawReceipt::Broadcast(_)));
    assert!(service.engine().snapshot().await.queued.is_empty());

    let queued = service
        .withdraw(
            to,
            d("0.25"),
            Asset::Native,
            SubmitMode::Queued { business_id: "w-7".to_string() },
        )
        .await
        .unwrap();
    assert_eq!(queued, WithdrawReceipt::Queued);
    assert_eq!(service.engine().snapshot().await.queued_ids(), vec!["w-7"]);
    assert_eq!(chain.broadcasts().len(), 1);
}

#[tokio::test]
async fn test_queued_withdraw_checks_credentials_up_front() {
    let chain = ScriptedChain::new();
    let (engine, _rx) = engine_with_credentials(chain, withdraw_credentials(), dispatch_config(100, None));
    let config = WalletConfig {
        withdraw_wallet_password: "wrong".to_string(),
        ..wallet_config()
    };
    let service = WalletService::new(engine, Arc::new(AccountBook::new(None)), None, config);

    let result = service
        .withdraw(
            Address::ZERO,
            Decimal::ONE,
            Asset::Native,
            SubmitMode::Queued { business_id: "w-1".to_string() },
        )
        .await;
    assert!(matches!(result, Err(PaymentError::Blockchain(BlockchainError::Authorization(_)))));
    assert!(service.engine().snapshot().await.queued.is_empty());
}

#[tokio::test]
async fn test_transfer_token_from_deposit_account() {
    let chain = ScriptedChain::new();
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "a.json", "0.1"));
    let service = service(chain.clone(), accounts, Some(usdt()));

    let receipt = service
        .transfer_token_from(Address::repeat_byte(1), Address::repeat_byte(0x42), d("12.5"), SubmitMode::Immediate)
        .await
        .unwrap();
    assert!(matches!(receipt, WithdrawReceipt::Broadcast(_)));

    let tx = decode(&chain.broadcasts()[0]);
    assert_eq!(tx.to(), Some(usdt().address));
    assert_eq!(tx.value(), U256::ZERO);
    assert_eq!(tx.gas_limit(), 60_000);

    let unknown = service
        .transfer_token_from(Address::repeat_byte(9), Address::repeat_byte(0x42), d("1"), SubmitMode::Immediate)
        .await;
    assert!(matches!(unknown, Err(PaymentError::AccountNotFound(_))));
}

#[tokio::test]
async fn test_transfer_token_requires_configured_token() {
    let chain = ScriptedChain::new();
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "a.json", "0.1"));
    let service = service(chain, accounts, None);

    let result = service
        .transfer_token_from(Address::repeat_byte(1), Address::ZERO, d("1"), SubmitMode::Immediate)
        .await;
    assert!(matches!(result, Err(PaymentError::InvalidToken(_))));
}

#[tokio::test]
async fn test_sync_balance_and_network_fee() {
    let chain = ScriptedChain::new();
    let address = Address::repeat_byte(1);
    chain.set_balance(address, U256::from(1_500_000_000_000_000_000u128));
    let accounts = AccountBook::new(None);
    accounts.insert(account(1, "a.json", "0"));
    let service = service(chain, accounts.clone(), Some(usdt()));

    assert_eq!(service.sync_balance(address).await.unwrap(), d("1.5"));
    let stored = accounts.find_by_address(address).await.unwrap().unwrap();
    assert_eq!(stored.balance, d("1.5"));

    // 1 gwei at 21k and 60k gas.
    assert_eq!(service.network_fee(&Asset::Native).await.unwrap(), d("0.000021"));
    assert_eq!(service.network_fee(&Asset::Token(usdt())).await.unwrap(), d("0.00006"));
}

#[tokio::test]
async fn test_token_amount_beyond_decimals_is_rejected() {
    let chain = ScriptedChain::new();
    let service = service(chain.clone(), AccountBook::new(None), Some(usdt()));
    let to = Address::repeat_byte(0x42);

    let queued = service
        .withdraw(
            to,
            d("1.0000001"),
            Asset::Token(usdt()),
            SubmitMode::Queued { business_id: "w-9".to_string() },
        )
        .await;
    assert!(matches!(queued, Err(PaymentError::Blockchain(BlockchainError::Encoding(_)))));
    assert!(service.engine().snapshot().await.queued.is_empty());

    let immediate = service
        .withdraw(to, d("1.0000001"), Asset::Token(usdt()), SubmitMode::Immediate)
        .await;
    assert!(matches!(immediate, Err(PaymentError::Blockchain(BlockchainError::Encoding(_)))));
    assert!(chain.broadcasts().is_empty());

    // Six decimals fit.
    let fits = service
        .withdraw(to, d("1.000001"), Asset::Token(usdt()), SubmitMode::Immediate)
        .await;
    assert!(matches!(fits, Ok(WithdrawReceipt::Broadcast(_))));
}
