//! Signing credentials and keystore loading.
//!
//! # Security
//! - Keys are unlocked from encrypted JSON keystores only when a payment needs them
//! - Key material is never logged or serialized; `Debug` shows the address only
//! - Keystore decryption (scrypt) runs on the blocking pool

use std::path::{Path, PathBuf};

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// An unlocked signing key for one sender address.
#[derive(Clone)]
pub struct Credential {
    signer: PrivateKeySigner,
}

impl Credential {
    /// Create a credential from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    pub fn from_private_key(private_key_hex: &str) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Authorization(format!("Invalid private key format: {}", e)))?;
        Ok(Self { signer })
    }

    /// Sender address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Network wallet used to sign transaction envelopes.
    pub(crate) fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl From<PrivateKeySigner> for Credential {
    fn from(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Source of unlocked credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Unlock the keystore named `wallet_file` with `password`.
    ///
    /// Fails with `CredentialNotFound` when the file is missing and
    /// `Authorization` when it cannot be decrypted.
    async fn load(&self, wallet_file: &str, password: &str) -> BlockchainResult<Credential>;
}

/// Encrypted JSON keystores stored in one directory.
#[derive(Debug, Clone)]
pub struct KeystoreDirectory {
    dir: PathBuf,
}

impl KeystoreDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl CredentialStore for KeystoreDirectory {
    async fn load(&self, wallet_file: &str, password: &str) -> BlockchainResult<Credential> {
        let path = self.dir.join(wallet_file);
        let password = password.to_string();

        // The file check and scrypt decryption both block.
        let signer = tokio::task::spawn_blocking(move || {
            if !path.is_file() {
                return Err(BlockchainError::CredentialNotFound(
                    path.display().to_string(),
                ));
            }
            PrivateKeySigner::decrypt_keystore(&path, password).map_err(|e| {
                BlockchainError::Authorization(format!("Cannot decrypt {}: {}", path.display(), e))
            })
        })
        .await
        .map_err(|e| BlockchainError::Authorization(format!("Keystore task failed: {}", e)))?
        .inspect_err(|e| {
            tracing::warn!(wallet_file = %wallet_file, error = %e, "Keystore unlock failed");
        })?;

        tracing::debug!(address = %signer.address(), wallet_file = %wallet_file, "Keystore unlocked");
        Ok(Credential::from(signer))
    }
}
