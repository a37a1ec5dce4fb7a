use serde::{Deserialize, Serialize};
use std::fmt;

/// An access/refresh credential pair issued by the backend.
///
/// The refresh token is single-use from this subsystem's perspective: a
/// successful exchange replaces the pair wholesale and the old refresh token
/// must never be exchanged again. The backend may keep accepting the old
/// access token until its own expiry; revocation is its concern.
///
/// # Security
///
/// The `Debug` implementation redacts both values; token material must never
/// reach logs or error messages.
///
/// # Examples
///
/// ```
/// use core_session::CredentialPair;
///
/// let pair = CredentialPair::new("eyJh...", "d8f3...");
/// assert!(!format!("{:?}", pair).contains("eyJh"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived signed token authorizing individual requests
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Longer-lived token exchanged for a new pair
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// The signed-in identity, opaque at this boundary.
///
/// The payload is stored and returned verbatim; this subsystem never
/// interprets its fields beyond existence. The concrete shape belongs to the
/// domain layer consuming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityRecord(serde_json::Value);

impl IdentityRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for IdentityRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Session state machine.
///
/// Exactly one state is active at a time; the state is owned exclusively by
/// the `SessionController` and all other components communicate through
/// events and return values.
///
/// # State Transitions
///
/// ```text
/// SignedOut -> Initializing -> SignedIn
///                  |    \         |
///                  v     v        v
///                Error  SignedOut SignedOut
/// ```
///
/// `Error` is reachable only from `Initializing`; runtime auth failures
/// during signed-in use route through sign-out instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No session; credentials cleared
    #[default]
    SignedOut,
    /// Startup restoration in progress
    Initializing,
    /// Authenticated, with the restored or freshly stored identity
    SignedIn(IdentityRecord),
    /// Restoration failed unexpectedly
    Error(String),
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::SignedOut => write!(f, "Signed Out"),
            SessionState::Initializing => write!(f, "Initializing..."),
            SessionState::SignedIn(_) => write!(f, "Signed In"),
            SessionState::Error(message) => write!(f, "Error: {}", message),
        }
    }
}
