//! Request Gate
//!
//! The interception point every outbound call passes through. Attaches the
//! current access credential, and reacts to the backend's 401 — the ground
//! truth on token validity — with exactly one refresh-and-resend cycle per
//! original call. A resent request that fails again propagates as-is; the
//! gate never loops.

use crate::config::BackendConfig;
use crate::refresh::RefreshCoordinator;
use crate::vault::CredentialVault;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Endpoints reachable without a bearer credential, matched as path
/// substrings.
const PUBLIC_PATH_MARKERS: [&str; 5] = [
    "login",
    "register",
    "refresh",
    "check-existence",
    "forgot-password",
];

/// Credential-injecting wrapper around the bare HTTP transport.
pub struct RequestGate {
    http: Arc<dyn HttpClient>,
    vault: CredentialVault,
    refresher: Arc<RefreshCoordinator>,
    config: BackendConfig,
}

impl RequestGate {
    pub fn new(
        http: Arc<dyn HttpClient>,
        vault: CredentialVault,
        refresher: Arc<RefreshCoordinator>,
        config: BackendConfig,
    ) -> Self {
        Self {
            http,
            vault,
            refresher,
            config,
        }
    }

    fn is_public(path: &str) -> bool {
        PUBLIC_PATH_MARKERS
            .iter()
            .any(|marker| path.contains(marker))
    }

    /// Send a request with credential handling.
    ///
    /// Non-public requests get the current access token as a bearer header.
    /// A 401 on a not-yet-resent request triggers one refresh; on success the
    /// request is resent once with the new token. A 401 on a public path is a
    /// domain failure (e.g. wrong password), not a credential failure, and is
    /// returned untouched.
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        // Every gated request carries a timeout; callers may override it
        let request = match request.timeout {
            Some(_) => request,
            None => request.timeout(self.config.request_timeout),
        };
        let public = Self::is_public(request.path());

        let first = self.with_bearer(request.clone(), public).await;
        let response = self.http.execute(first).await?;

        if public || !response.is_unauthorized() {
            return Ok(response);
        }

        debug!("Request rejected with 401, running one refresh cycle");
        if !self.refresher.refresh().await {
            // The coordinator has already announced the lost authorization;
            // the caller gets the original failure.
            warn!("Refresh failed, propagating original authorization failure");
            return Ok(response);
        }

        let resend = self.with_bearer(request, public).await;
        self.http.execute(resend).await
    }

    async fn with_bearer(&self, request: HttpRequest, public: bool) -> HttpRequest {
        if public {
            return request;
        }
        match self.vault.access_token().await {
            Some(token) => request.bearer_token(token),
            None => request,
        }
    }
}
