//! Encrypted at-rest storage of per-repository access tokens.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::project::{Project, ProjectId, ProjectStore};

/// Environment variable carrying the base64 AES-256 key.
pub const ENCRYPTION_KEY_ENV: &str = "REPOSITORY_TOKEN_ENCRYPTION_KEY";

/// Default token lifetime when the caller does not specify one.
const DEFAULT_TOKEN_TTL_DAYS: i64 = 365;

const NONCE_LEN: usize = 12;

/// Symmetric vault for per-repository credentials.
///
/// Decryption failures and expired tokens surface as "no token"; the stored
/// ciphertext is invalidated in place so callers can fall back to
/// unauthenticated access for public repositories.
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl TokenVault {
    /// Build a vault from `REPOSITORY_TOKEN_ENCRYPTION_KEY`.
    ///
    /// Without the variable a fresh key is generated and logged once so an
    /// operator can pin it; in production mode this is refused instead.
    ///
    /// # Errors
    /// Returns `StoreError::Vault` when the key material is malformed, or
    /// when no key is configured and `production` is set.
    pub fn from_env(production: bool) -> Result<Self, StoreError> {
        match std::env::var(ENCRYPTION_KEY_ENV) {
            Ok(encoded) => {
                let bytes = BASE64.decode(encoded.trim()).map_err(|e| {
                    StoreError::Vault(format!("invalid base64 in {ENCRYPTION_KEY_ENV}: {e}"))
                })?;
                if bytes.len() != 32 {
                    return Err(StoreError::Vault(format!(
                        "{ENCRYPTION_KEY_ENV} must decode to 32 bytes, got {}",
                        bytes.len()
                    )));
                }
                Ok(Self::with_key(&bytes))
            }
            Err(_) if production => Err(StoreError::Vault(format!(
                "{ENCRYPTION_KEY_ENV} is required in production mode"
            ))),
            Err(_) => {
                let key = Aes256Gcm::generate_key(OsRng);
                warn!(
                    "no {ENCRYPTION_KEY_ENV} set; generated an ephemeral key. Tokens will not \
                     survive a restart. Set {ENCRYPTION_KEY_ENV}={} to pin it",
                    BASE64.encode(key.as_slice())
                );
                Ok(Self {
                    cipher: Aes256Gcm::new(&key),
                })
            }
        }
    }

    /// Build a vault from explicit 32-byte key material.
    #[must_use]
    pub fn with_key(key: &[u8]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt and store a token for a project. Returns whether a token was
    /// stored; empty plaintext is rejected.
    pub async fn store(
        &self,
        store: &ProjectStore,
        id: ProjectId,
        token: &str,
        ttl_days: Option<i64>,
    ) -> bool {
        if token.trim().is_empty() {
            error!(project = id, "refusing to store empty access token");
            return false;
        }

        let encrypted = match self.encrypt(token) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                error!(project = id, error = %e, "token encryption failed");
                return false;
            }
        };

        let expires_at = Utc::now() + Duration::days(ttl_days.unwrap_or(DEFAULT_TOKEN_TTL_DAYS));
        let updated = store
            .update(id, |project| {
                project.encrypted_token = Some(encrypted);
                project.token_expires_at = Some(expires_at);
                project.token_last_used_at = Some(Utc::now());
            })
            .await;

        match updated {
            Ok(project) => {
                info!(project = %project.name, expires = %expires_at.format("%Y-%m-%d"), "stored encrypted token");
                true
            }
            Err(e) => {
                error!(project = id, error = %e, "failed to persist token");
                false
            }
        }
    }

    /// Decrypt and return the stored token if present and unexpired.
    ///
    /// Expired or undecryptable tokens are invalidated in place and
    /// reported as absent.
    pub async fn get(&self, store: &ProjectStore, id: ProjectId) -> Option<String> {
        let project = store.get(id).await?;
        let encrypted = project.encrypted_token.as_deref()?;

        if project
            .token_expires_at
            .is_some_and(|expires| expires < Utc::now())
        {
            warn!(project = %project.name, "token expired");
            self.invalidate(store, id).await;
            return None;
        }

        match self.decrypt(encrypted) {
            Ok(token) => {
                let _ = store
                    .update(id, |p| p.token_last_used_at = Some(Utc::now()))
                    .await;
                debug!(project = %project.name, "retrieved valid token");
                Some(token)
            }
            Err(e) => {
                error!(project = %project.name, error = %e, "token decryption failed");
                self.invalidate(store, id).await;
                None
            }
        }
    }

    /// Clear the stored token for a project.
    pub async fn invalidate(&self, store: &ProjectStore, id: ProjectId) {
        let result = store
            .update(id, |project| {
                project.encrypted_token = None;
                project.token_expires_at = None;
            })
            .await;
        if let Ok(project) = result {
            info!(project = %project.name, "invalidated token");
        }
    }

    /// Whether a project holds a non-expired token. Pure predicate.
    #[must_use]
    pub fn is_valid(project: &Project) -> bool {
        project.encrypted_token.is_some()
            && project
                .token_expires_at
                .is_none_or(|expires| expires > Utc::now())
    }

    /// Replace the stored token when it differs from `new_token`; otherwise
    /// just bump the last-used timestamp. Returns whether a replacement
    /// happened.
    pub async fn refresh_if_changed(
        &self,
        store: &ProjectStore,
        id: ProjectId,
        new_token: &str,
    ) -> bool {
        let current = self.get(store, id).await;
        if current.as_deref() != Some(new_token) {
            info!(project = id, "updating stored token");
            return self.store(store, id, new_token, None).await;
        }
        let _ = store
            .update(id, |p| p.token_last_used_at = Some(Utc::now()))
            .await;
        false
    }

    /// Invalidate every token past its expiry. Returns the number cleared.
    pub async fn sweep_expired(&self, store: &ProjectStore) -> usize {
        let now = Utc::now();
        let mut count = 0;
        for project in store.all().await {
            if project.encrypted_token.is_some()
                && project.token_expires_at.is_some_and(|expires| expires < now)
            {
                self.invalidate(store, project.id).await;
                count += 1;
            }
        }
        if count > 0 {
            info!(count, "swept expired tokens");
        }
        count
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| StoreError::Vault(format!("encryption failed: {e}")))?;
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, StoreError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| StoreError::Vault(format!("ciphertext is not valid base64: {e}")))?;
        if combined.len() <= NONCE_LEN {
            return Err(StoreError::Vault("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| StoreError::Vault(format!("decryption failed: {e}")))?;
        String::from_utf8(plaintext)
            .map_err(|e| StoreError::Vault(format!("decrypted token is not utf-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_vault() -> TokenVault {
        TokenVault::with_key(&[7u8; 32])
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();

        assert!(vault.store(&store, project.id, "ghp_secret", None).await);
        assert_eq!(
            vault.get(&store, project.id).await.as_deref(),
            Some("ghp_secret")
        );

        let snapshot = store.get(project.id).await.unwrap();
        assert!(snapshot.token_last_used_at.is_some());
        // at rest the token is never plaintext
        assert_ne!(snapshot.encrypted_token.as_deref(), Some("ghp_secret"));
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();
        assert!(!vault.store(&store, project.id, "   ", None).await);
        assert!(vault.get(&store, project.id).await.is_none());
    }

    #[tokio::test]
    async fn test_store_twice_is_idempotent_in_effect() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();
        assert!(vault.store(&store, project.id, "tok", None).await);
        assert!(vault.store(&store, project.id, "tok", None).await);
        assert_eq!(vault.get(&store, project.id).await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalidated_on_get() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();
        vault.store(&store, project.id, "tok", None).await;
        store
            .update(project.id, |p| {
                p.token_expires_at = Some(Utc::now() - Duration::days(1));
            })
            .await
            .unwrap();

        assert!(vault.get(&store, project.id).await.is_none());
        let snapshot = store.get(project.id).await.unwrap();
        assert!(snapshot.encrypted_token.is_none());
        assert!(snapshot.token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_undecryptable_token_is_invalidated() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();
        vault.store(&store, project.id, "tok", None).await;

        // a vault with a different key cannot decrypt and must clear the row
        let other = TokenVault::with_key(&[9u8; 32]);
        assert!(other.get(&store, project.id).await.is_none());
        assert!(store.get(project.id).await.unwrap().encrypted_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_if_changed() {
        let store = ProjectStore::new();
        let project = store.register("repo", "https://github.com/o/repo").await;
        let vault = test_vault();
        vault.store(&store, project.id, "old", None).await;

        assert!(vault.refresh_if_changed(&store, project.id, "new").await);
        assert_eq!(vault.get(&store, project.id).await.as_deref(), Some("new"));
        assert!(!vault.refresh_if_changed(&store, project.id, "new").await);
    }

    #[tokio::test]
    async fn test_sweep_expired_is_idempotent() {
        let store = ProjectStore::new();
        let vault = test_vault();
        let live = store.register("live", "https://github.com/o/live").await;
        let dead = store.register("dead", "https://github.com/o/dead").await;
        vault.store(&store, live.id, "tok", None).await;
        vault.store(&store, dead.id, "tok", None).await;
        store
            .update(dead.id, |p| {
                p.token_expires_at = Some(Utc::now() - Duration::days(2));
            })
            .await
            .unwrap();

        assert_eq!(vault.sweep_expired(&store).await, 1);
        assert_eq!(vault.sweep_expired(&store).await, 0);
        assert!(TokenVault::is_valid(&store.get(live.id).await.unwrap()));
        assert!(!TokenVault::is_valid(&store.get(dead.id).await.unwrap()));
    }

    #[test]
    #[serial]
    fn test_from_env_refuses_missing_key_in_production() {
        std::env::remove_var(ENCRYPTION_KEY_ENV);
        assert!(TokenVault::from_env(true).is_err());
        assert!(TokenVault::from_env(false).is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_short_key() {
        std::env::set_var(ENCRYPTION_KEY_ENV, BASE64.encode([1u8; 16]));
        let result = TokenVault::from_env(false);
        std::env::remove_var(ENCRYPTION_KEY_ENV);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_accepts_valid_key() {
        std::env::set_var(ENCRYPTION_KEY_ENV, BASE64.encode([3u8; 32]));
        let result = TokenVault::from_env(true);
        std::env::remove_var(ENCRYPTION_KEY_ENV);
        assert!(result.is_ok());
    }
}
