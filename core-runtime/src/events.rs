//! # Event Bus System
//!
//! Typed broadcast channel for session lifecycle events, built on
//! `tokio::sync::broadcast`. Modules that produce auth state changes publish
//! here; consumers (navigation, domain stores) subscribe independently and
//! never reach into each other's state.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SessionEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(SessionEvent::AuthorizationLost {
//!         reason: "refresh token rejected".to_string(),
//!     })
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receive errors:
//!
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events. Non-fatal;
//!   receiving continues with the next event.
//! - `RecvError::Closed`: all senders dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Session lifecycle events.
///
/// Event payloads stay lightweight; they carry what a consumer needs to react,
/// never credential material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A session was established (sign-in, registration, or startup restore).
    SignedIn,
    /// The local session ended and storage was cleared.
    SignedOut,
    /// A refresh exchange replaced the credential pair.
    TokenRefreshed {
        /// Expiry of the new access token (epoch millis), when decodable.
        expires_at: Option<i64>,
    },
    /// A refresh exchange failed terminally; authorization cannot be
    /// recovered without a fresh sign-in. Fired once per failed exchange.
    AuthorizationLost {
        /// Human-readable failure summary.
        reason: String,
    },
}

impl SessionEvent {
    /// Returns a log-friendly description of the event.
    pub fn description(&self) -> &str {
        match self {
            SessionEvent::SignedIn => "Session established",
            SessionEvent::SignedOut => "Session ended",
            SessionEvent::TokenRefreshed { .. } => "Access token refreshed",
            SessionEvent::AuthorizationLost { .. } => "Authorization permanently lost",
        }
    }
}

/// Central event bus for publishing and subscribing to session events.
///
/// Uses `tokio::sync::broadcast` internally:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Slow subscribers get `RecvError::Lagged` instead of blocking fast ones
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are no active subscribers.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber receiving all future events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
