//! Chat transport - the boundary between a chat session and the network
//!
//! A transport carries raw text frames to the backend. Whatever arrives from
//! the other side (frames, closure, failure) is reported back as a
//! [`TransportEvent`] on an mpsc channel owned by the session, so the session
//! stays the only place that mutates the transcript.
//!
//! # Implementations
//! - [`websocket::WebSocketConnector`]: tokio-tungstenite client
//! - [`memory::MemoryConnector`]: in-process peer for tests and demos

pub mod memory;
pub mod websocket;

use reqwest::Url;
use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::{MemoryConnector, MemoryPeer, MemoryTransport};
pub use websocket::{WebSocketConnector, WebSocketTransport};

/// Something the transport observed on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; queued frames are being flushed
    Opened,
    /// One inbound text frame, verbatim
    Frame(String),
    /// The remote side closed the connection
    Closed { reason: Option<String> },
    /// The connection could not be opened or broke while open
    Failed(TransportError),
}

/// Errors that can occur in a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Opening the connection failed
    #[error("handshake with {url} failed: {reason}")]
    Handshake { url: String, reason: String },

    /// Connection lost after it was open
    #[error("transport disconnected: {reason}")]
    Disconnected { reason: String },

    /// The transport was already closed locally
    #[error("transport not available: {reason}")]
    NotAvailable { reason: String },
}

impl TransportError {
    /// Handshake and disconnect failures are transient; a local close is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::NotAvailable { .. })
    }
}

/// Sending half of a session's event channel
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of a session's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the channel a transport uses to report back to its session
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// An open (or opening) connection
///
/// Both methods return immediately. A transport must accept frames before its
/// handshake completes and deliver them once it does.
pub trait Transport: Send {
    /// Hand one text frame to the connection. Does not wait for delivery.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Close the connection. Frames already handed over are still flushed.
    /// Calling it again is a no-op.
    fn close(&mut self);
}

/// Opens transports for a chat session
pub trait Connector {
    type Transport: Transport;

    /// Start connecting to `url`. Progress and inbound traffic are reported
    /// on `events`; this never blocks on the network.
    fn connect(&self, url: &Url, events: EventSender) -> Self::Transport;
}
