//! Refresh Coordinator
//!
//! Performs the refresh-token exchange with a single-flight guarantee: at
//! most one exchange is in flight process-wide, and every concurrent caller
//! observes the outcome of that one exchange. This is what keeps a single-use
//! refresh token from being spent twice when several requests discover an
//! expired access token at the same time.
//!
//! The exchange goes through the bare [`HttpClient`], never the request gate,
//! so a 401 from the refresh endpoint cannot recurse into another refresh.
//!
//! The coordinator never clears the vault: deciding what a failed refresh
//! means for the session belongs to the controller, which hears about it via
//! the `AuthorizationLost` event. That event is emitted here, on the leader
//! path, so it fires exactly once per failed exchange no matter how many
//! callers were waiting on it.

use crate::claims;
use crate::config::{BackendConfig, REFRESH_PATH};
use crate::types::CredentialPair;
use crate::vault::CredentialVault;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_runtime::events::{EventBus, SessionEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

enum Role {
    Leader(broadcast::Sender<bool>),
    Waiter(broadcast::Receiver<bool>),
}

/// Single-flight refresh-token exchange.
pub struct RefreshCoordinator {
    vault: CredentialVault,
    http: Arc<dyn HttpClient>,
    config: BackendConfig,
    event_bus: EventBus,
    /// The in-flight marker: present while an exchange runs. Acts as the
    /// cooperative mutex for the single-flight guarantee.
    in_flight: Mutex<Option<broadcast::Sender<bool>>>,
}

impl RefreshCoordinator {
    pub fn new(
        vault: CredentialVault,
        http: Arc<dyn HttpClient>,
        config: BackendConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            vault,
            http,
            config,
            event_bus,
            in_flight: Mutex::new(None),
        }
    }

    /// Exchange the stored refresh token for a new credential pair.
    ///
    /// Returns `true` when a new pair was obtained AND persisted. Joins an
    /// already-running exchange instead of starting a second one; all callers
    /// of the same exchange see the same outcome.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> bool {
        let role = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.as_ref() {
                Some(tx) => Role::Waiter(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    *in_flight = Some(tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(mut rx) => {
                debug!("Refresh already in flight, waiting for its outcome");
                // recv fails only if the leader vanished without settling;
                // never treat that as a refreshed credential
                rx.recv().await.unwrap_or(false)
            }
            Role::Leader(tx) => {
                let succeeded = self.run_exchange().await;

                // Clear the marker on every exit path before waking waiters;
                // a wedged marker would block every future refresh.
                *self.in_flight.lock().await = None;
                let _ = tx.send(succeeded);
                succeeded
            }
        }
    }

    async fn run_exchange(&self) -> bool {
        let Some(refresh_token) = self.vault.refresh_token().await else {
            warn!("No refresh token in storage, failing without a network call");
            self.report_loss("no refresh token in storage");
            return false;
        };

        let exchanged = timeout(self.config.refresh_timeout, self.exchange(&refresh_token)).await;

        let pair = match exchanged {
            Ok(Ok(pair)) => pair,
            Ok(Err(reason)) => {
                warn!(reason = %reason, "Refresh exchange failed");
                self.report_loss(&reason);
                return false;
            }
            Err(_) => {
                warn!("Refresh exchange timed out");
                self.report_loss("refresh exchange timed out");
                return false;
            }
        };

        // The new pair fully replaces the old one; callers must not trust a
        // refresh whose credentials never reached storage.
        if let Err(e) = self.vault.store_credentials(&pair).await {
            warn!(error = %e, "Refreshed credentials could not be persisted");
            self.report_loss("refreshed credentials could not be persisted");
            return false;
        }

        let expires_at = claims::expiry_timestamp(&pair.access_token);
        let _ = self
            .event_bus
            .emit(SessionEvent::TokenRefreshed { expires_at });

        info!("Access token refreshed");
        true
    }

    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, String> {
        let request = HttpRequest::post(self.config.endpoint(REFRESH_PATH))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .map_err(|e| format!("could not encode refresh request: {}", e))?
            .timeout(self.config.refresh_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| format!("network error: {}", e))?;

        if !response.is_success() {
            return Err(format!("refresh endpoint returned {}", response.status));
        }

        response
            .json::<CredentialPair>()
            .map_err(|e| format!("malformed refresh response: {}", e))
    }

    fn report_loss(&self, reason: &str) {
        let _ = self.event_bus.emit(SessionEvent::AuthorizationLost {
            reason: reason.to_string(),
        });
    }
}
