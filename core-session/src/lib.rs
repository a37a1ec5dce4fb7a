//! # Session Core
//!
//! Authentication and token lifecycle for clients of the platform backend.
//!
//! ## Overview
//!
//! This crate acquires, persists, injects, and transparently refreshes the
//! credentials that authorize every call the client makes. It owns the
//! session state machine and the single-flight refresh exchange; everything
//! else in the application consumes it through three questions: "give me a
//! valid bearer credential", "who is signed in", and "tell me when
//! authorization is permanently lost".
//!
//! ## Components
//!
//! - [`CredentialVault`] - credential and identity persistence over a
//!   host-provided secure store, with an in-memory access token cache
//! - [`claims`] - pure expiry inspection of signed tokens
//! - [`RefreshCoordinator`] - single-flight refresh-token exchange
//! - [`RequestGate`] - bearer injection and the one-retry-after-refresh rule
//! - [`SessionController`] - the state machine façade
//!
//! ## Wiring
//!
//! ```no_run
//! use core_runtime::events::EventBus;
//! use core_session::{bootstrap, BackendConfig};
//! use std::sync::Arc;
//! # use bridge_traits::{HttpClient, SecureStore};
//! # async fn example(store: Arc<dyn SecureStore>, http: Arc<dyn HttpClient>) {
//! let event_bus = EventBus::new(100);
//! let config = BackendConfig::new("https://api.example.com");
//!
//! let (controller, gate) = bootstrap(store, http, config, event_bus);
//! let _watch = controller.watch_authorization();
//! controller.initialize().await.expect("already initialized");
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod refresh;
pub mod types;
pub mod vault;

pub use config::BackendConfig;
pub use controller::SessionController;
pub use error::{Result, SessionError};
pub use gate::RequestGate;
pub use refresh::RefreshCoordinator;
pub use types::{CredentialPair, IdentityRecord, SessionState};
pub use vault::CredentialVault;

use bridge_traits::http::HttpClient;
use bridge_traits::storage::SecureStore;
use core_runtime::events::EventBus;
use std::sync::Arc;

/// Wire the subsystem together around one store, one transport, and one bus.
///
/// Returns the controller (session façade) and the gate (what the general
/// request layer sends through). Both share the same vault and coordinator,
/// so the controller's startup refresh and the gate's 401-triggered refresh
/// can never run a second concurrent exchange.
pub fn bootstrap(
    store: Arc<dyn SecureStore>,
    http: Arc<dyn HttpClient>,
    config: BackendConfig,
    event_bus: EventBus,
) -> (Arc<SessionController>, Arc<RequestGate>) {
    let vault = CredentialVault::new(store);
    let refresher = Arc::new(RefreshCoordinator::new(
        vault.clone(),
        http.clone(),
        config.clone(),
        event_bus.clone(),
    ));
    let gate = Arc::new(RequestGate::new(
        http,
        vault.clone(),
        refresher.clone(),
        config.clone(),
    ));
    let controller = Arc::new(SessionController::new(
        vault,
        gate.clone(),
        refresher,
        event_bus,
        config,
    ));
    (controller, gate)
}
