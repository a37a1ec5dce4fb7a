//! Integration tests for the session lifecycle
//!
//! These tests exercise the components wired together the way a host
//! application wires them: one secure store, one transport, one event bus.
//! They cover the cross-component properties:
//! - single-flight refresh under concurrency
//! - at most one retry per gated request
//! - startup restoration across the expired/missing credential matrix
//! - sign-out determinism regardless of backend health
//! - the lost-authorization broadcast ending the session

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use bytes::Bytes;
use core_runtime::events::{EventBus, SessionEvent};
use core_session::{
    bootstrap, BackendConfig, CredentialPair, CredentialVault, IdentityRecord, RefreshCoordinator,
    SessionState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

struct MemoryStore {
    storage: tokio::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            storage: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    async fn seed(&self, key: &str, value: &str) {
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.as_bytes().to_vec());
    }

    async fn read(&self, key: &str) -> Option<String> {
        self.storage
            .lock()
            .await
            .get(key)
            .map(|bytes| String::from_utf8(bytes.clone()).unwrap())
    }

    async fn is_empty(&self) -> bool {
        self.storage.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.storage.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum RefreshBehavior {
    /// Answer 200 with a fresh pair
    Succeed,
    /// Answer the given status
    Reject(u16),
    /// Fail at the transport layer
    NetworkError,
}

/// Scripted backend: refresh and logout are recognized by path, everything
/// else is a "protected" endpoint answering a fixed status.
struct FakeBackend {
    refresh_behavior: StdMutex<RefreshBehavior>,
    refresh_delay: Duration,
    refresh_calls: AtomicUsize,
    protected_status: u16,
    protected_calls: AtomicUsize,
    /// Authorization header of each protected request, in order
    bearers_seen: StdMutex<Vec<Option<String>>>,
    logout_error: bool,
}

impl FakeBackend {
    fn new(refresh_behavior: RefreshBehavior, protected_status: u16) -> Arc<Self> {
        Arc::new(Self {
            refresh_behavior: StdMutex::new(refresh_behavior),
            refresh_delay: Duration::ZERO,
            refresh_calls: AtomicUsize::new(0),
            protected_status,
            protected_calls: AtomicUsize::new(0),
            bearers_seen: StdMutex::new(Vec::new()),
            logout_error: false,
        })
    }

    fn with_refresh_delay(mut self: Arc<Self>, delay: Duration) -> Arc<Self> {
        Arc::get_mut(&mut self).unwrap().refresh_delay = delay;
        self
    }

    fn with_logout_error(mut self: Arc<Self>) -> Arc<Self> {
        Arc::get_mut(&mut self).unwrap().logout_error = true;
        self
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = request.path().to_string();

        if path.contains("refresh") {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            return match *self.refresh_behavior.lock().unwrap() {
                RefreshBehavior::Succeed => Ok(Self::response(
                    200,
                    r#"{"accessToken":"fresh-access","refreshToken":"fresh-refresh"}"#,
                )),
                RefreshBehavior::Reject(status) => Ok(Self::response(status, "refresh rejected")),
                RefreshBehavior::NetworkError => {
                    Err(BridgeError::Http("connection reset".to_string()))
                }
            };
        }

        if path.contains("logout") {
            return if self.logout_error {
                Err(BridgeError::Http("connection reset".to_string()))
            } else {
                Ok(Self::response(200, "{}"))
            };
        }

        self.protected_calls.fetch_add(1, Ordering::SeqCst);
        self.bearers_seen
            .lock()
            .unwrap()
            .push(request.headers.get("Authorization").cloned());
        Ok(Self::response(self.protected_status, "{}"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn token_expiring_at(exp_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::to_vec(&serde_json::json!({ "sub": "user-1", "exp": exp_secs })).unwrap());
    format!("{}.{}.sig", header, payload)
}

fn expired_token() -> String {
    token_expiring_at(chrono::Utc::now().timestamp() - 60)
}

fn valid_token() -> String {
    token_expiring_at(chrono::Utc::now().timestamp() + 3600)
}

fn config() -> BackendConfig {
    BackendConfig::new("https://api.example.com").with_refresh_timeout(Duration::from_secs(2))
}

async fn seed_full_session(store: &MemoryStore, access_token: &str) {
    store.seed("accessToken", access_token).await;
    store.seed("refreshToken", "refresh-1").await;
    store.seed("user", r#"{"id":1,"email":"a@b.c"}"#).await;
    store.seed("authState", r#"{"isAuthenticated":true}"#).await;
}

fn count_lost_events(events: &mut core_runtime::events::Receiver<SessionEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::AuthorizationLost { .. }) {
            count += 1;
        }
    }
    count
}

fn identity() -> IdentityRecord {
    IdentityRecord::new(serde_json::json!({ "id": 1, "email": "a@b.c" }))
}

// ---------------------------------------------------------------------------
// Single-flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_refreshes_share_one_exchange() {
    let store = MemoryStore::new();
    seed_full_session(&store, &expired_token()).await;

    let backend =
        FakeBackend::new(RefreshBehavior::Succeed, 200).with_refresh_delay(Duration::from_millis(50));
    let bus = EventBus::new(16);
    let vault = CredentialVault::new(store.clone());
    let coordinator = Arc::new(RefreshCoordinator::new(
        vault.clone(),
        backend.clone(),
        config(),
        bus,
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move { coordinator.refresh().await }));
    }

    for handle in handles {
        assert!(handle.await.unwrap(), "every caller sees the shared success");
    }

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.read("accessToken").await.as_deref(), Some("fresh-access"));
    assert_eq!(store.read("refreshToken").await.as_deref(), Some("fresh-refresh"));
}

#[tokio::test]
async fn concurrent_refresh_failure_reaches_all_waiters_with_one_announcement() {
    let store = MemoryStore::new();
    seed_full_session(&store, &expired_token()).await;

    let backend = FakeBackend::new(RefreshBehavior::Reject(401), 200)
        .with_refresh_delay(Duration::from_millis(50));
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let vault = CredentialVault::new(store.clone());
    let coordinator = Arc::new(RefreshCoordinator::new(
        vault,
        backend.clone(),
        config(),
        bus,
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move { coordinator.refresh().await }));
    }

    for handle in handles {
        assert!(!handle.await.unwrap(), "every caller sees the shared failure");
    }

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(count_lost_events(&mut events), 1);

    // The coordinator itself never clears storage
    assert_eq!(store.read("refreshToken").await.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn refresh_works_again_after_a_failed_exchange() {
    let store = MemoryStore::new();
    seed_full_session(&store, &expired_token()).await;

    let backend = FakeBackend::new(RefreshBehavior::NetworkError, 200);
    let bus = EventBus::new(16);
    let vault = CredentialVault::new(store.clone());
    let coordinator = RefreshCoordinator::new(vault, backend.clone(), config(), bus);

    // The failed exchange must not wedge the in-flight marker
    assert!(!coordinator.refresh().await);
    *backend.refresh_behavior.lock().unwrap() = RefreshBehavior::Succeed;
    assert!(coordinator.refresh().await);

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// At-most-one-retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gated_request_retries_once_and_then_propagates() {
    let store = MemoryStore::new();
    seed_full_session(&store, &valid_token()).await;

    // Protected endpoint answers 401 forever, refresh succeeds
    let backend = FakeBackend::new(RefreshBehavior::Succeed, 401);
    let (_controller, gate) = bootstrap(
        store.clone(),
        backend.clone(),
        config(),
        EventBus::new(16),
    );

    let response = gate
        .send(HttpRequest::get("https://api.example.com/orders"))
        .await
        .unwrap();

    // Second 401 propagates without a second refresh cycle
    assert_eq!(response.status, 401);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.protected_calls.load(Ordering::SeqCst), 2);

    // The resend carried the refreshed token
    let bearers = backend.bearers_seen.lock().unwrap();
    assert_eq!(bearers[1].as_deref(), Some("Bearer fresh-access"));
}

#[tokio::test]
async fn failed_refresh_propagates_the_original_failure() {
    let store = MemoryStore::new();
    seed_full_session(&store, &valid_token()).await;

    let backend = FakeBackend::new(RefreshBehavior::Reject(403), 401);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let (_controller, gate) = bootstrap(store.clone(), backend.clone(), config(), bus);

    let response = gate
        .send(HttpRequest::get("https://api.example.com/orders"))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    // No resend after a failed refresh
    assert_eq!(backend.protected_calls.load(Ordering::SeqCst), 1);
    assert_eq!(count_lost_events(&mut events), 1);
}

#[tokio::test]
async fn public_path_401_never_triggers_refresh() {
    let store = MemoryStore::new();
    seed_full_session(&store, &valid_token()).await;

    // Every non-auth endpoint (including login, which the fake backend does
    // not special-case) answers 401
    let backend = FakeBackend::new(RefreshBehavior::Succeed, 401);
    let (_controller, gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let response = gate
        .send(HttpRequest::post("https://api.example.com/auth/login"))
        .await
        .unwrap();

    // A login rejection is a domain failure, not a credential failure:
    // no bearer, no refresh, the 401 comes straight back
    assert_eq!(response.status, 401);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    let bearers = backend.bearers_seen.lock().unwrap();
    assert_eq!(bearers.len(), 1);
    assert_eq!(bearers[0], None);
}

// ---------------------------------------------------------------------------
// Startup restoration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_with_valid_token_restores_without_refresh() {
    let store = MemoryStore::new();
    seed_full_session(&store, &valid_token()).await;

    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200);
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let state = controller.initialize().await.unwrap();

    assert!(matches!(state, SessionState::SignedIn(_)));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(controller.identity().await, Some(identity()));
}

#[tokio::test]
async fn initialize_with_expired_token_refreshes_once() {
    let store = MemoryStore::new();
    let old_token = expired_token();
    seed_full_session(&store, &old_token).await;

    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200);
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let state = controller.initialize().await.unwrap();

    assert!(matches!(state, SessionState::SignedIn(_)));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);

    // The stored access token was replaced by the exchange
    let stored = store.read("accessToken").await.unwrap();
    assert_ne!(stored, old_token);
    assert_eq!(stored, "fresh-access");
}

#[tokio::test]
async fn initialize_without_refresh_token_ends_signed_out() {
    let store = MemoryStore::new();
    store.seed("accessToken", &expired_token()).await;
    store.seed("user", r#"{"id":1}"#).await;
    store.seed("authState", r#"{"isAuthenticated":true}"#).await;

    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200);
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let state = controller.initialize().await.unwrap();

    assert_eq!(state, SessionState::SignedOut);
    // Missing refresh token fails locally: zero refresh network calls
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn initialize_with_rejected_refresh_clears_and_ends_signed_out() {
    let store = MemoryStore::new();
    seed_full_session(&store, &expired_token()).await;

    let backend = FakeBackend::new(RefreshBehavior::Reject(401), 200);
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let state = controller.initialize().await.unwrap();

    assert_eq!(state, SessionState::SignedOut);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(store.is_empty().await);
    assert!(!controller.is_session_valid().await);
}

#[tokio::test]
async fn initialize_with_missing_identity_clears_leftover_credentials() {
    let store = MemoryStore::new();
    store.seed("accessToken", &valid_token()).await;
    store.seed("refreshToken", "refresh-1").await;
    store.seed("authState", r#"{"isAuthenticated":true}"#).await;

    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200);
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));

    let state = controller.initialize().await.unwrap();

    assert_eq!(state, SessionState::SignedOut);
    assert!(store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Sign-out determinism
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_out_clears_locally_even_when_backend_logout_fails() {
    let store = MemoryStore::new();
    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200).with_logout_error();
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let (controller, _gate) = bootstrap(store.clone(), backend.clone(), config(), bus);

    controller.initialize().await.unwrap();
    controller
        .sign_in(CredentialPair::new(valid_token(), "refresh-1"), identity())
        .await
        .unwrap();

    controller.sign_out().await;

    assert!(!controller.is_session_valid().await);
    assert_eq!(store.read("accessToken").await, None);
    assert_eq!(store.read("refreshToken").await, None);
    assert_eq!(controller.access_token().await, None);

    // SignedIn then SignedOut, each exactly once
    let mut signed_out = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::SignedOut) {
            signed_out += 1;
        }
    }
    assert_eq!(signed_out, 1);
}

#[tokio::test]
async fn concurrent_sign_out_triggers_collapse() {
    let store = MemoryStore::new();
    let backend = FakeBackend::new(RefreshBehavior::Succeed, 200);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let (controller, _gate) = bootstrap(store.clone(), backend, config(), bus);

    controller.initialize().await.unwrap();
    controller
        .sign_in(CredentialPair::new(valid_token(), "refresh-1"), identity())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move { controller.sign_out().await }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(!controller.is_session_valid().await);

    let mut signed_out = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::SignedOut) {
            signed_out += 1;
        }
    }
    assert_eq!(signed_out, 1, "no duplicate sign-out transitions");
}

// ---------------------------------------------------------------------------
// Lost authorization ends the session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authorization_loss_mid_session_signs_out() {
    let store = MemoryStore::new();
    seed_full_session(&store, &valid_token()).await;

    // Every protected call 401s and the refresh token is rejected
    let backend = FakeBackend::new(RefreshBehavior::Reject(401), 401);
    let (controller, gate) = bootstrap(store.clone(), backend.clone(), config(), EventBus::new(16));
    let watch = controller.watch_authorization();

    controller.initialize().await.unwrap();
    assert!(controller.is_session_valid().await);

    let response = gate
        .send(HttpRequest::get("https://api.example.com/orders"))
        .await
        .unwrap();
    assert_eq!(response.status, 401);

    // Give the watch task a moment to observe the broadcast
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!controller.is_session_valid().await);
    assert_eq!(controller.state().await, SessionState::SignedOut);
    assert!(store.is_empty().await);

    watch.abort();
}
