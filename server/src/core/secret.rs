//! JWT signing key storage
//!
//! Generates the server's JWT signing key on first use and persists it
//! (hex-encoded) under the data directory so existing sessions survive a
//! restart.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::constants::SECRET_KEY_JWT_SIGNING;
use super::storage::AppStorage;
use crate::utils::crypto;

const SECRETS_FILENAME: &str = "secrets.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SecretVault {
    #[serde(default)]
    jwt_signing_key: Option<String>,
}

/// Persists the server's signing secrets to disk across restarts.
#[derive(Debug, Clone)]
pub struct SecretManager {
    path: PathBuf,
    vault: Arc<RwLock<SecretVault>>,
}

impl SecretManager {
    pub async fn init(storage: &AppStorage) -> Result<Self> {
        let path = storage.data_path(SECRETS_FILENAME);
        let vault = Self::load(&path).await?;
        Ok(Self {
            path,
            vault: Arc::new(RwLock::new(vault)),
        })
    }

    async fn load(path: &PathBuf) -> Result<SecretVault> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json).context("Failed to parse secrets file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SecretVault::default()),
            Err(e) => Err(e).context("Failed to read secrets file"),
        }
    }

    async fn save(&self) -> Result<()> {
        let vault = self.vault.read().await;
        let json = serde_json::to_string_pretty(&*vault).context("Failed to serialize secrets")?;
        tokio::fs::write(&self.path, json)
            .await
            .context("Failed to write secrets file")?;
        Ok(())
    }

    /// Get the JWT signing key, generating and persisting one on first use.
    pub async fn get_jwt_signing_key(&self) -> Result<Vec<u8>> {
        {
            let vault = self.vault.read().await;
            if let Some(key_hex) = vault.jwt_signing_key.as_ref()
                && let Ok(key) = crypto::decode_hex(key_hex)
                && key.len() == 32
            {
                return Ok(key);
            }
        }

        let key = crypto::generate_signing_key();
        {
            let mut vault = self.vault.write().await;
            vault.jwt_signing_key = Some(crypto::encode_hex(&key));
        }
        self.save().await?;
        tracing::debug!(key = SECRET_KEY_JWT_SIGNING, "Generated new JWT signing key");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generates_and_persists_key_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppStorage::init_for_test(dir.path().to_path_buf());

        let manager = SecretManager::init(&storage).await.unwrap();
        let key = manager.get_jwt_signing_key().await.unwrap();
        assert_eq!(key.len(), 32);

        let manager2 = SecretManager::init(&storage).await.unwrap();
        let key2 = manager2.get_jwt_signing_key().await.unwrap();
        assert_eq!(key, key2);
    }

    #[tokio::test]
    async fn regenerates_corrupted_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = AppStorage::init_for_test(dir.path().to_path_buf());
        let manager = SecretManager::init(&storage).await.unwrap();

        {
            let mut vault = manager.vault.write().await;
            vault.jwt_signing_key = Some("not-hex!!".to_string());
        }

        let key = manager.get_jwt_signing_key().await.unwrap();
        assert_eq!(key.len(), 32);
    }
}
