//! Session Controller
//!
//! The stateful façade the rest of the application consumes. Owns the
//! session state machine, orchestrates startup restoration from the vault,
//! exposes the sign-in/sign-out entry points, and reacts to lost
//! authorization announced on the event bus.
//!
//! State is owned exclusively here; the vault, gate, and coordinator
//! communicate through return values and events, never by mutating session
//! state directly.

use crate::claims;
use crate::config::{BackendConfig, LOGOUT_PATH};
use crate::error::{Result, SessionError};
use crate::gate::RequestGate;
use crate::refresh::RefreshCoordinator;
use crate::types::{CredentialPair, IdentityRecord, SessionState};
use crate::vault::CredentialVault;
use bridge_traits::http::HttpRequest;
use core_runtime::events::{EventBus, RecvError, SessionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

/// Session state machine and application-facing session API.
pub struct SessionController {
    vault: CredentialVault,
    gate: Arc<RequestGate>,
    refresher: Arc<RefreshCoordinator>,
    event_bus: EventBus,
    config: BackendConfig,
    state: RwLock<SessionState>,
    /// Restoration runs once per process.
    initialized: AtomicBool,
    /// In-progress flag making concurrent sign-out triggers idempotent.
    signing_out: AtomicBool,
}

impl SessionController {
    pub fn new(
        vault: CredentialVault,
        gate: Arc<RequestGate>,
        refresher: Arc<RefreshCoordinator>,
        event_bus: EventBus,
        config: BackendConfig,
    ) -> Self {
        Self {
            vault,
            gate,
            refresher,
            event_bus,
            config,
            state: RwLock::new(SessionState::SignedOut),
            initialized: AtomicBool::new(false),
            signing_out: AtomicBool::new(false),
        }
    }

    /// Restore a persisted session. Called once at process start.
    ///
    /// Both credentials and the identity record must be present for a
    /// restore; an expired access token gets one refresh attempt. Any
    /// incomplete or unrefreshable leftover is cleared and the session starts
    /// signed out.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` when called more than once.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<SessionState> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyInitialized);
        }
        *self.state.write().await = SessionState::Initializing;

        let next = match self.restore().await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Unexpected failure during session restoration");
                SessionState::Error(e.to_string())
            }
        };

        *self.state.write().await = next.clone();
        if next.is_signed_in() {
            let _ = self.event_bus.emit(SessionEvent::SignedIn);
        }

        info!(state = %next, "Session restoration finished");
        Ok(next)
    }

    async fn restore(&self) -> Result<SessionState> {
        // Fast path: a clean first launch has neither the marker nor a token.
        if !self.vault.was_authenticated().await && self.vault.access_token().await.is_none() {
            debug!("No persisted session");
            return Ok(SessionState::SignedOut);
        }

        let access_token = self.vault.access_token().await;
        let refresh_token = self.vault.refresh_token().await;
        let identity = self.vault.identity().await;

        let (access_token, identity) = match (access_token, refresh_token, identity) {
            (Some(access), Some(_refresh), Some(identity)) => (access, identity),
            _ => {
                debug!("Persisted session is incomplete, clearing");
                self.vault.clear_all().await;
                return Ok(SessionState::SignedOut);
            }
        };

        if !claims::is_expired(&access_token) {
            info!("Persisted access token still valid, session restored");
            return Ok(SessionState::SignedIn(identity));
        }

        info!("Persisted access token expired, attempting refresh");
        if self.refresher.refresh().await {
            // A refresh that reported success has persisted a readable pair.
            if self.vault.access_token().await.is_none() {
                return Err(SessionError::StorageUnavailable(
                    "refreshed credentials are not readable".to_string(),
                ));
            }
            return Ok(SessionState::SignedIn(identity));
        }

        warn!("Refresh during restoration failed, clearing persisted session");
        self.vault.clear_all().await;
        Ok(SessionState::SignedOut)
    }

    /// Establish a session from the credential pair and identity produced by
    /// the sign-in flow.
    ///
    /// The identity-proofing exchange itself happens outside this subsystem;
    /// its result arrives here as an opaque pair plus identity record.
    ///
    /// # Errors
    ///
    /// Fails when the credentials cannot be persisted; the in-memory session
    /// is not established in that case.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, pair: CredentialPair, identity: IdentityRecord) -> Result<()> {
        self.establish_session(pair, identity).await
    }

    /// Establish a session for a freshly registered account.
    #[instrument(skip_all)]
    pub async fn complete_registration(
        &self,
        pair: CredentialPair,
        identity: IdentityRecord,
    ) -> Result<()> {
        self.establish_session(pair, identity).await
    }

    async fn establish_session(&self, pair: CredentialPair, identity: IdentityRecord) -> Result<()> {
        // Persistence must land before the in-memory session is trusted.
        self.vault.store_credentials(&pair).await?;
        self.vault.store_identity(&identity).await;

        *self.state.write().await = SessionState::SignedIn(identity);
        let _ = self.event_bus.emit(SessionEvent::SignedIn);

        info!("Session established");
        Ok(())
    }

    /// End the session.
    ///
    /// The backend logout call is best-effort; local state is cleared
    /// unconditionally even when it fails. Concurrent triggers collapse into
    /// one transition. Not cancellable once started.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if self.signing_out.swap(true, Ordering::SeqCst) {
            debug!("Sign-out already in progress");
            return;
        }

        if self.state.read().await.is_signed_in() {
            self.notify_backend_logout().await;
        }

        self.finish_sign_out().await;
        self.signing_out.store(false, Ordering::SeqCst);
    }

    /// Spawn the background watch reacting to lost authorization.
    ///
    /// Mid-session refresh exhaustion arrives as `AuthorizationLost`; the
    /// watch performs the local sign-out transition without a backend call,
    /// since the credentials are already dead.
    pub fn watch_authorization(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = controller.event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::AuthorizationLost { reason }) => {
                        if controller.is_session_valid().await {
                            warn!(reason = %reason, "Authorization lost, ending session");
                            controller.force_local_sign_out().await;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed = missed, "Session event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Raw access token for callers needing the value outside the gate.
    pub async fn access_token(&self) -> Option<String> {
        self.vault.access_token().await
    }

    /// The signed-in identity, if any.
    pub async fn identity(&self) -> Option<IdentityRecord> {
        match &*self.state.read().await {
            SessionState::SignedIn(identity) => Some(identity.clone()),
            _ => None,
        }
    }

    pub async fn is_session_valid(&self) -> bool {
        self.state.read().await.is_signed_in()
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    async fn force_local_sign_out(&self) {
        if self.signing_out.swap(true, Ordering::SeqCst) {
            return;
        }
        self.finish_sign_out().await;
        self.signing_out.store(false, Ordering::SeqCst);
    }

    async fn finish_sign_out(&self) {
        self.vault.clear_all().await;

        let was_signed_out = {
            let mut state = self.state.write().await;
            let was = matches!(*state, SessionState::SignedOut);
            *state = SessionState::SignedOut;
            was
        };

        if !was_signed_out {
            let _ = self.event_bus.emit(SessionEvent::SignedOut);
            info!("Signed out");
        }
    }

    async fn notify_backend_logout(&self) {
        let request = HttpRequest::post(self.config.endpoint(LOGOUT_PATH));

        match self.gate.send(request).await {
            Ok(response) if response.is_success() => debug!("Backend logout acknowledged"),
            Ok(response) => debug!(
                status = response.status,
                "Backend logout rejected, continuing local sign-out"
            ),
            Err(e) => warn!(error = %e, "Backend logout failed, continuing local sign-out"),
        }
    }
}
