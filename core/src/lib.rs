//! `devpane-core` - chat session controller and its plumbing
//!
//! The chat pane of devpane streams plain text over a WebSocket to an external
//! backend. This crate holds everything behind that pane: configuration,
//! endpoint derivation, the [`ChatSession`] state machine, the transports it
//! talks through, and an HTTP probe for the backend's status endpoints.

pub mod chat;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod probe;
pub mod transport;

// Re-exports for convenience
pub use chat::{ChatSession, Message, Role, SendOutcome, SessionState, SessionUpdate, Transcript};
pub use config::Config;
pub use error::{DevpaneError, Result};
pub use probe::BackendClient;
pub use transport::{MemoryConnector, WebSocketConnector};
