//! Credential Vault
//!
//! Persistence for the credential pair and the signed-in identity, layered on
//! a host-provided [`SecureStore`]. Whether that store is an OS keychain or a
//! conventional key-value fallback is invisible here; the vault only speaks
//! the trait.
//!
//! The access token is additionally cached in process memory on first
//! read/write so the hot path (every gated request) avoids a storage
//! round-trip. The cache is overwritten by every [`CredentialVault::store_credentials`]
//! and invalidated by [`CredentialVault::clear_all`].
//!
//! Read failures and corrupt payloads surface as `None`, never as errors;
//! only `store_credentials` reports failure, because callers must not trust
//! an in-memory session whose credentials never reached disk.

use crate::error::{Result, SessionError};
use crate::types::{CredentialPair, IdentityRecord};
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

// Persisted key layout, identical across storage backends.
const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const IDENTITY_KEY: &str = "user";
const AUTH_STATE_KEY: &str = "authState";

/// Redundant fast-path restoration marker; derived state is authoritative.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedAuthState {
    #[serde(rename = "isAuthenticated")]
    is_authenticated: bool,
}

/// Secure persistence for the session's credentials and identity.
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn SecureStore>,
    cached_access_token: Arc<RwLock<Option<String>>>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            cached_access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Persist a credential pair, replacing any previous pair wholesale.
    ///
    /// # Errors
    ///
    /// Fails when either token cannot be written; the in-memory cache is only
    /// updated once both writes have landed.
    pub async fn store_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.store
            .set_secret(ACCESS_TOKEN_KEY, pair.access_token.as_bytes())
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist access token");
                SessionError::StorageUnavailable(e.to_string())
            })?;

        self.store
            .set_secret(REFRESH_TOKEN_KEY, pair.refresh_token.as_bytes())
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist refresh token");
                SessionError::StorageUnavailable(e.to_string())
            })?;

        // Fast-path marker; restoration falls back to the tokens themselves
        // when this write is lost.
        let marker = PersistedAuthState {
            is_authenticated: true,
        };
        if let Ok(bytes) = serde_json::to_vec(&marker) {
            if let Err(e) = self.store.set_secret(AUTH_STATE_KEY, &bytes).await {
                warn!(error = %e, "Failed to persist auth marker");
            }
        }

        *self.cached_access_token.write().await = Some(pair.access_token.clone());

        debug!("Credential pair stored");
        Ok(())
    }

    /// Current access token, from the memory cache when warm.
    pub async fn access_token(&self) -> Option<String> {
        if let Some(token) = self.cached_access_token.read().await.clone() {
            return Some(token);
        }

        let loaded = self.read_string(ACCESS_TOKEN_KEY).await;
        if let Some(token) = &loaded {
            *self.cached_access_token.write().await = Some(token.clone());
        }
        loaded
    }

    /// Current refresh token. Never cached; it is read once per exchange.
    pub async fn refresh_token(&self) -> Option<String> {
        self.read_string(REFRESH_TOKEN_KEY).await
    }

    /// Persist the identity record, best-effort.
    ///
    /// A lost write surfaces later as a missing record during restoration,
    /// which ends the session cleanly; it never aborts the current sign-in.
    pub async fn store_identity(&self, record: &IdentityRecord) {
        match serde_json::to_vec(record.as_value()) {
            Ok(bytes) => {
                if let Err(e) = self.store.set_secret(IDENTITY_KEY, &bytes).await {
                    warn!(error = %e, "Failed to persist identity record");
                }
            }
            Err(e) => warn!(error = %e, "Identity record could not be serialized"),
        }
    }

    /// The persisted identity record, if present and readable.
    pub async fn identity(&self) -> Option<IdentityRecord> {
        let bytes = match self.store.get_secret(IDENTITY_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read identity record");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(IdentityRecord::new(value)),
            Err(e) => {
                warn!(error = %e, "Persisted identity record is corrupt");
                None
            }
        }
    }

    /// Fast-path restoration hint written at sign-in.
    pub async fn was_authenticated(&self) -> bool {
        let bytes = match self.store.get_secret(AUTH_STATE_KEY).await {
            Ok(Some(bytes)) => bytes,
            _ => return false,
        };

        serde_json::from_slice::<PersistedAuthState>(&bytes)
            .map(|state| state.is_authenticated)
            .unwrap_or(false)
    }

    /// Wipe all persisted session data and the memory cache.
    ///
    /// Each deletion attempt is independent and swallows its own error: a
    /// partial wipe must never block sign-out. Clearing an already-empty
    /// store is a no-op.
    pub async fn clear_all(&self) {
        *self.cached_access_token.write().await = None;

        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            IDENTITY_KEY,
            AUTH_STATE_KEY,
        ] {
            if let Err(e) = self.store.delete_secret(key).await {
                warn!(key = key, error = %e, "Failed to delete credential entry");
            }
        }

        debug!("Credential storage cleared");
    }

    async fn read_string(&self, key: &str) -> Option<String> {
        match self.store.get_secret(key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key = key, "Stored credential entry is not valid UTF-8");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read from secure storage");
                None
            }
        }
    }
}
