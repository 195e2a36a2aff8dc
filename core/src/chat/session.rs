//! Chat session controller
//!
//! Owns one connection and one transcript. The transport never touches the
//! transcript directly: it reports inbound frames, closure and failure as
//! [`TransportEvent`]s, and the session applies them one at a time through
//! [`ChatSession::next_event`] or [`ChatSession::drain_pending`]. Transcript
//! order is therefore the order in which events reach the session.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --initialize--> Open --teardown / remote close / failure--> Closed
//! Uninitialized --malformed endpoint / teardown--------------------------> Closed
//! ```
//!
//! `Closed` is terminal; there is no reconnect. Sends made while not open are
//! still appended to the transcript but never reach the backend.

use reqwest::Url;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::message::Message;
use super::transcript::Transcript;
use crate::config::Config;
use crate::endpoint::{derive_channel_url, DEFAULT_CHAT_PATH};
use crate::error::{DevpaneError, Result};
use crate::transport::{event_channel, Connector, EventReceiver, Transport, TransportError, TransportEvent};

/// Connection lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Connection created; the handshake may still be in progress
    Open,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Why a session ended up closed without a teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFault {
    MalformedEndpoint { input: String, reason: String },
    Transport(TransportError),
}

impl std::fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionFault::MalformedEndpoint { input, reason } => {
                write!(f, "malformed endpoint '{}': {}", input, reason)
            }
            ConnectionFault::Transport(err) => write!(f, "{}", err),
        }
    }
}

/// Result of [`ChatSession::send_local`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only input; nothing happened
    Blank,
    /// Appended and handed to the connection
    Forwarded,
    /// Appended, but the connection was not open so nothing was sent
    Dropped,
}

/// What applying one transport event did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Handshake completed
    Connected,
    /// A remote message was appended at this transcript index
    Appended(usize),
    /// The backend closed the connection
    Closed { reason: Option<String> },
    /// The connection failed
    Failed(TransportError),
    /// The event arrived after the session closed and was discarded
    Ignored,
}

/// Controller for one chat conversation
pub struct ChatSession<C: Connector> {
    id: Uuid,
    connector: C,
    chat_path: String,
    state: SessionState,
    transport: Option<C::Transport>,
    events: Option<EventReceiver>,
    transcript: Transcript,
    channel_url: Option<Url>,
    fault: Option<ConnectionFault>,
    frames_sent: u64,
    frames_dropped: u64,
}

impl<C: Connector> ChatSession<C> {
    /// New session using the default chat path
    pub fn new(connector: C) -> Self {
        Self::with_chat_path(connector, DEFAULT_CHAT_PATH)
    }

    /// New session whose channel path comes from `config`
    pub fn from_config(connector: C, config: &Config) -> Self {
        Self::with_chat_path(connector, &config.chat_path)
    }

    pub fn with_chat_path(connector: C, chat_path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            connector,
            chat_path: chat_path.to_string(),
            state: SessionState::Uninitialized,
            transport: None,
            events: None,
            transcript: Transcript::new(),
            channel_url: None,
            fault: None,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Channel address derived by `initialize`, if it got that far
    pub fn channel_url(&self) -> Option<&Url> {
        self.channel_url.as_ref()
    }

    /// Why the connection ended, when it was not a local teardown
    pub fn fault(&self) -> Option<&ConnectionFault> {
        self.fault.as_ref()
    }

    /// Frames handed to the connection
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Local messages appended while the connection could not take them
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Whether transport events may still arrive
    pub fn has_pending_events(&self) -> bool {
        self.events.is_some()
    }

    /// Derive the channel address from `endpoint_base` and open the connection.
    ///
    /// A malformed base moves the session straight to `Closed`. Failures
    /// during the handshake arrive later as a [`SessionUpdate::Failed`].
    pub fn initialize(&mut self, endpoint_base: &str) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(DevpaneError::AlreadyInitialized {
                state: self.state.to_string(),
            });
        }

        let url = match derive_channel_url(endpoint_base, &self.chat_path) {
            Ok(url) => url,
            Err(err) => {
                warn!(session = %self.id, error = %err, "cannot open chat connection");
                if let DevpaneError::MalformedEndpoint { input, reason } = &err {
                    self.fault = Some(ConnectionFault::MalformedEndpoint {
                        input: input.clone(),
                        reason: reason.clone(),
                    });
                }
                self.state = SessionState::Closed;
                return Err(err);
            }
        };

        let (events_tx, events_rx) = event_channel();
        self.transport = Some(self.connector.connect(&url, events_tx));
        self.events = Some(events_rx);
        info!(session = %self.id, %url, "chat connection opening");
        self.channel_url = Some(url);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Append a local message and forward it to the backend.
    ///
    /// Blank input is ignored. The message is appended even when the
    /// connection is not open; in that case the frame is silently dropped.
    pub fn send_local(&mut self, text: &str) -> SendOutcome {
        if is_blank(text) {
            return SendOutcome::Blank;
        }

        self.transcript.push(Message::local(text));

        let sent = match (self.state, self.transport.as_mut()) {
            (SessionState::Open, Some(transport)) => match transport.send_text(text) {
                Ok(()) => true,
                Err(err) => {
                    debug!(session = %self.id, error = %err, "frame not sent");
                    false
                }
            },
            _ => false,
        };

        if sent {
            self.frames_sent += 1;
            SendOutcome::Forwarded
        } else {
            debug!(session = %self.id, state = %self.state, "dropping local frame");
            self.frames_dropped += 1;
            SendOutcome::Dropped
        }
    }

    /// Append a remote message. No validation, no deduplication.
    pub fn on_remote(&mut self, text: impl Into<String>) -> usize {
        self.transcript.push(Message::remote(text))
    }

    /// Apply one transport event
    pub fn handle_event(&mut self, event: TransportEvent) -> SessionUpdate {
        if self.state != SessionState::Open {
            debug!(session = %self.id, ?event, "event after close discarded");
            return SessionUpdate::Ignored;
        }

        match event {
            TransportEvent::Opened => {
                debug!(session = %self.id, "chat connection established");
                SessionUpdate::Connected
            }
            TransportEvent::Frame(text) => SessionUpdate::Appended(self.on_remote(text)),
            TransportEvent::Closed { reason } => {
                info!(session = %self.id, reason = ?reason, "chat connection closed by backend");
                self.close_connection();
                SessionUpdate::Closed { reason }
            }
            TransportEvent::Failed(err) => {
                warn!(session = %self.id, error = %err, "chat connection failed");
                self.fault = Some(ConnectionFault::Transport(err.clone()));
                self.close_connection();
                SessionUpdate::Failed(err)
            }
        }
    }

    /// Wait for the next transport event and apply it.
    ///
    /// Returns `None` once no further events can arrive.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let received = self.events.as_mut()?.recv().await;
        match received {
            Some(event) => Some(self.handle_event(event)),
            None => {
                // The transport hung up without saying why.
                self.events = None;
                if self.state == SessionState::Open {
                    Some(self.handle_event(TransportEvent::Closed { reason: None }))
                } else {
                    None
                }
            }
        }
    }

    /// Apply every event that is already waiting, without blocking
    pub fn drain_pending(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(events) = self.events.as_mut() {
            match events.try_recv() {
                Ok(event) => updates.push(self.handle_event(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    if self.state == SessionState::Open {
                        updates.push(self.handle_event(TransportEvent::Closed { reason: None }));
                    }
                }
            }
        }
        updates
    }

    /// Close the connection if open. Safe to call any number of times; the
    /// session is `Closed` afterwards.
    pub fn teardown(&mut self) {
        match self.state {
            SessionState::Open => {
                info!(
                    session = %self.id,
                    messages = self.transcript.len(),
                    "tearing down chat session"
                );
                self.close_connection();
            }
            SessionState::Uninitialized => {
                self.state = SessionState::Closed;
            }
            SessionState::Closed => {}
        }
    }

    fn close_connection(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.events = None;
        self.state = SessionState::Closed;
    }
}

/// Whitespace, including a stray byte-order mark, does not count as content
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{feff}')
}

impl<C: Connector> Drop for ChatSession<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::transport::{MemoryConnector, MemoryPeer};

    const BASE: &str = "http://localhost:8000";

    fn open_session() -> (ChatSession<MemoryConnector>, MemoryPeer) {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector.clone());
        session.initialize(BASE).unwrap();
        let peer = connector.take_peer().unwrap();
        assert_eq!(session.drain_pending(), vec![SessionUpdate::Connected]);
        (session, peer)
    }

    fn roles_and_contents(session: &ChatSession<MemoryConnector>) -> Vec<(Role, String)> {
        session
            .transcript()
            .iter()
            .map(|m| (m.role(), m.content().to_string()))
            .collect()
    }

    #[test]
    fn test_initialize_opens_derived_channel() {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector.clone());
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.initialize("https://backend.example:8443").unwrap();

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            connector.last_url().unwrap().as_str(),
            "wss://backend.example:8443/ws/chat"
        );
        assert_eq!(session.channel_url(), connector.last_url().as_ref());
    }

    #[test]
    fn test_malformed_endpoint_closes_without_connecting() {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector.clone());

        let err = session.initialize("localhost:8000").unwrap_err();

        assert!(matches!(err, DevpaneError::MalformedEndpoint { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.fault(),
            Some(ConnectionFault::MalformedEndpoint { .. })
        ));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let (mut session, _peer) = open_session();
        let err = session.initialize(BASE).unwrap_err();
        assert!(matches!(err, DevpaneError::AlreadyInitialized { .. }));
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_send_local_appends_and_forwards_once() {
        let (mut session, mut peer) = open_session();

        assert_eq!(session.send_local("check pod status"), SendOutcome::Forwarded);

        assert_eq!(
            roles_and_contents(&session),
            vec![(Role::Local, "check pod status".to_string())]
        );
        assert_eq!(peer.drain_sent(), vec!["check pod status"]);
        assert_eq!(session.frames_sent(), 1);
    }

    #[test]
    fn test_blank_input_is_a_no_op() {
        let (mut session, mut peer) = open_session();

        for blank in ["", " ", "\t", "\n  \r\n", "\u{feff}", " \u{feff}\u{a0}"] {
            assert_eq!(session.send_local(blank), SendOutcome::Blank);
        }

        assert!(session.transcript().is_empty());
        assert!(peer.drain_sent().is_empty());
        assert_eq!(session.frames_sent(), 0);
        assert_eq!(session.frames_dropped(), 0);
    }

    #[test]
    fn test_content_is_kept_verbatim() {
        let (mut session, mut peer) = open_session();
        session.send_local("  indented\n");
        assert_eq!(session.transcript().messages()[0].content(), "  indented\n");
        assert_eq!(peer.drain_sent(), vec!["  indented\n"]);
    }

    #[test]
    fn test_remote_frames_are_never_deduplicated() {
        let (mut session, peer) = open_session();

        for _ in 0..3 {
            assert!(peer.push_frame("same"));
        }
        let updates = session.drain_pending();

        assert_eq!(
            updates,
            vec![
                SessionUpdate::Appended(0),
                SessionUpdate::Appended(1),
                SessionUpdate::Appended(2)
            ]
        );
        assert_eq!(session.transcript().stats().remote, 3);
    }

    #[test]
    fn test_on_remote_appends_unconditionally() {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector);
        assert_eq!(session.on_remote(""), 0);
        assert_eq!(session.on_remote("x"), 1);
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn test_transcript_follows_event_order() {
        let (mut session, peer) = open_session();

        session.send_local("A");
        peer.push_frame("B");
        session.drain_pending();
        session.send_local("C");

        assert_eq!(
            roles_and_contents(&session),
            vec![
                (Role::Local, "A".to_string()),
                (Role::Remote, "B".to_string()),
                (Role::Local, "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_send_before_initialize_is_dropped_but_echoed() {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector.clone());

        assert_eq!(session.send_local("early"), SendOutcome::Dropped);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.frames_dropped(), 1);
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut session, peer) = open_session();

        session.teardown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(peer.is_closed_locally());

        session.teardown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_pending_events());
    }

    #[test]
    fn test_teardown_before_initialize_is_terminal() {
        let connector = MemoryConnector::new();
        let mut session = ChatSession::new(connector.clone());
        session.teardown();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.initialize(BASE).is_err());
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_sends_after_teardown_are_dropped() {
        let (mut session, mut peer) = open_session();
        session.teardown();

        assert_eq!(session.send_local("anyone there?"), SendOutcome::Dropped);
        assert_eq!(session.transcript().len(), 1);
        assert!(peer.drain_sent().is_empty());
    }

    #[test]
    fn test_remote_close_is_terminal() {
        let (mut session, peer) = open_session();

        peer.close_remote(Some("server shutdown"));
        peer.push_frame("too late");
        let updates = session.drain_pending();

        assert_eq!(
            updates,
            vec![SessionUpdate::Closed {
                reason: Some("server shutdown".to_string())
            }]
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.transcript().is_empty());
        assert!(session.fault().is_none());
    }

    #[test]
    fn test_transport_failure_records_fault() {
        let (mut session, peer) = open_session();

        peer.fail("connection reset");
        let updates = session.drain_pending();

        assert!(matches!(updates.as_slice(), [SessionUpdate::Failed(_)]));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(session.fault(), Some(ConnectionFault::Transport(_))));
    }

    #[test]
    fn test_refused_handshake_closes_session() {
        let connector = MemoryConnector::refusing("connection refused");
        let mut session = ChatSession::new(connector);
        session.initialize(BASE).unwrap();
        assert_eq!(session.state(), SessionState::Open);

        let updates = session.drain_pending();
        assert!(matches!(
            updates.as_slice(),
            [SessionUpdate::Failed(TransportError::Handshake { .. })]
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_handle_event_after_close_is_ignored() {
        let (mut session, _peer) = open_session();
        session.teardown();
        assert_eq!(
            session.handle_event(TransportEvent::Frame("late".to_string())),
            SessionUpdate::Ignored
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_custom_chat_path_from_config() {
        let connector = MemoryConnector::new();
        let config = Config {
            chat_path: "/stream".to_string(),
            ..Config::default()
        };
        let mut session = ChatSession::from_config(connector.clone(), &config);
        session.initialize(&config.backend_url).unwrap();
        assert_eq!(
            connector.last_url().unwrap().as_str(),
            "ws://localhost:8000/stream"
        );
    }

    #[tokio::test]
    async fn test_next_event_waits_for_frames() {
        let (mut session, peer) = open_session();

        let pusher = tokio::spawn(async move {
            tokio::task::yield_now().await;
            peer.push_frame("streamed reply");
            peer
        });

        assert_eq!(session.next_event().await, Some(SessionUpdate::Appended(0)));
        let _peer = pusher.await.unwrap();
        assert_eq!(session.transcript().messages()[0].content(), "streamed reply");
    }

    #[tokio::test]
    async fn test_next_event_reports_hangup_as_close() {
        let (mut session, peer) = open_session();
        drop(peer);

        assert_eq!(
            session.next_event().await,
            Some(SessionUpdate::Closed { reason: None })
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.next_event().await, None);
    }

    #[test]
    fn test_drain_pending_reports_hangup_as_close() {
        let (mut session, peer) = open_session();
        drop(peer);

        assert_eq!(
            session.drain_pending(),
            vec![SessionUpdate::Closed { reason: None }]
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_pending_events());
        assert_eq!(session.send_local("anyone there?"), SendOutcome::Dropped);
        assert!(session.drain_pending().is_empty());
    }
}
