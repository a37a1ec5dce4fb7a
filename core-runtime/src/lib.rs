//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the session platform core:
//! - Typed event bus for session lifecycle broadcasts
//! - Logging and tracing bootstrap
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other core crates depend on.
//! It establishes the logging conventions and the event broadcasting
//! mechanism used to decouple the request layer from the session state
//! machine.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{EventBus, SessionEvent};
