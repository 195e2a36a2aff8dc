//! In-memory transport
//!
//! For single-process use: unit tests, demos, and driving a session without
//! a backend. Every `connect` creates a [`MemoryPeer`], the far end of the
//! connection, which a test takes from the connector to inspect outbound
//! frames and inject inbound ones.
//!
//! # Example
//! ```rust,ignore
//! let connector = MemoryConnector::new();
//! let mut session = ChatSession::new(connector.clone());
//! session.initialize("http://localhost:8000")?;
//!
//! let mut peer = connector.take_peer().unwrap();
//! session.send_local("hello");
//! assert_eq!(peer.drain_sent(), vec!["hello"]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::Url;
use tokio::sync::mpsc;

use super::{Connector, EventSender, Transport, TransportError, TransportEvent};

#[derive(Default)]
struct ConnectorState {
    peers: VecDeque<MemoryPeer>,
    urls: Vec<Url>,
    refuse_with: Option<String>,
}

/// Connector whose connections stay inside the process
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose handshakes always fail with `reason`
    pub fn refusing(reason: impl Into<String>) -> Self {
        let connector = Self::default();
        connector.lock().refuse_with = Some(reason.into());
        connector
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnectorState> {
        // A panicking test thread must not hide the connector from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the far end of the oldest connection not yet taken
    pub fn take_peer(&self) -> Option<MemoryPeer> {
        self.lock().peers.pop_front()
    }

    /// Number of `connect` calls seen so far
    pub fn connect_count(&self) -> usize {
        self.lock().urls.len()
    }

    /// URL passed to the most recent `connect`
    pub fn last_url(&self) -> Option<Url> {
        self.lock().urls.last().cloned()
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn connect(&self, url: &Url, events: EventSender) -> MemoryTransport {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let mut state = self.lock();
        state.urls.push(url.clone());

        match &state.refuse_with {
            Some(reason) => {
                let _ = events.send(TransportEvent::Failed(TransportError::Handshake {
                    url: url.to_string(),
                    reason: reason.clone(),
                }));
            }
            None => {
                let _ = events.send(TransportEvent::Opened);
            }
        }

        state.peers.push_back(MemoryPeer {
            sent: sent_rx,
            events,
            closed: closed.clone(),
        });

        MemoryTransport {
            sent: sent_tx,
            closed,
        }
    }
}

/// Session-side handle of an in-memory connection
pub struct MemoryTransport {
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::NotAvailable {
                reason: "transport closed".to_string(),
            });
        }
        self.sent
            .send(text.to_string())
            .map_err(|_| TransportError::Disconnected {
                reason: "peer dropped".to_string(),
            })
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Far end of an in-memory connection, playing the backend
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<String>,
    events: EventSender,
    closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Deliver one inbound frame to the session. False if the session is gone.
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Frame(text.into())).is_ok()
    }

    /// Close the connection from the backend side
    pub fn close_remote(&self, reason: Option<&str>) -> bool {
        self.events
            .send(TransportEvent::Closed {
                reason: reason.map(str::to_string),
            })
            .is_ok()
    }

    /// Break the connection abnormally
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.events
            .send(TransportEvent::Failed(TransportError::Disconnected {
                reason: reason.into(),
            }))
            .is_ok()
    }

    /// All frames the session has sent so far, oldest first
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Whether the session side closed the connection
    pub fn is_closed_locally(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
