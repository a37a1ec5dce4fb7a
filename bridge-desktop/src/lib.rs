//! # Desktop Host Bridges
//!
//! Desktop implementations of the `bridge-traits` contracts:
//!
//! - [`KeyringSecureStore`] - credential storage in the OS keychain
//! - [`SqliteSecureStore`] - conventional persistent key-value fallback
//! - [`ReqwestHttpClient`] - HTTP transport
//!
//! [`default_secure_store`] probes the host at startup and hands back
//! whichever credential backend actually works, behind the shared
//! `SecureStore` interface.

pub mod http;
pub mod kv_store;
#[cfg(feature = "secure-store")]
pub mod secure_store;

pub use http::ReqwestHttpClient;
pub use kv_store::SqliteSecureStore;
#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::SecureStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Select the best available credential backend for this host.
///
/// Prefers the OS keychain when the `secure-store` feature is enabled and a
/// working secret service is present; otherwise falls back to a SQLite store
/// under the user's data directory. Callers receive one `SecureStore` either
/// way and never branch on the backend.
pub async fn default_secure_store(app_name: &str) -> Result<Arc<dyn SecureStore>> {
    #[cfg(feature = "secure-store")]
    {
        let keyring = KeyringSecureStore::with_service_name(app_name);
        if keyring.is_available().await {
            info!("Using OS keychain for credential storage");
            return Ok(Arc::new(keyring));
        }
        info!("OS keychain unavailable, falling back to local store");
    }

    let db_path = fallback_db_path(app_name)?;
    let store = SqliteSecureStore::new(db_path).await?;
    info!("Using SQLite fallback for credential storage");
    Ok(Arc::new(store))
}

fn fallback_db_path(app_name: &str) -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| BridgeError::NotAvailable("no data directory on this host".to_string()))?;
    Ok(base.join(app_name).join("credentials.db"))
}
