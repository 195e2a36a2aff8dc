//! WebSocket transport
//!
//! Each connection runs on its own tokio task. The task owns the socket; the
//! [`WebSocketTransport`] handle only pushes outbound commands into an
//! unbounded queue, which is why sends issued before the handshake completes
//! are not lost. A close issued during the handshake abandons it.

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{Connector, EventSender, Transport, TransportError, TransportEvent};

/// Opens [`WebSocketTransport`]s. Must be used inside a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    fn connect(&self, url: &Url, events: EventSender) -> WebSocketTransport {
        WebSocketTransport::spawn(url.clone(), events)
    }
}

enum Outbound {
    Text(String),
    Close,
}

/// Handle to one WebSocket connection task
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: bool,
}

impl WebSocketTransport {
    /// Spawn the connection task. Returns before the handshake starts.
    pub fn spawn(url: Url, events: EventSender) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(url, outbound_rx, events));
        Self {
            outbound,
            closed: false,
        }
    }
}

impl Transport for WebSocketTransport {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotAvailable {
                reason: "transport closed".to_string(),
            });
        }
        self.outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::Disconnected {
                reason: "connection task ended".to_string(),
            })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // The task may already be gone after a remote close.
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: EventSender,
) {
    let mut queued = Vec::new();
    let handshake = connect_async(url.as_str());
    tokio::pin!(handshake);

    let connected = loop {
        tokio::select! {
            result = &mut handshake => break result,
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => queued.push(text),
                Some(Outbound::Close) | None => {
                    debug!(%url, "closed during handshake");
                    return;
                }
            },
        }
    };

    let ws_stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(%url, error = %e, "websocket handshake failed");
            let _ = events.send(TransportEvent::Failed(TransportError::Handshake {
                url: url.to_string(),
                reason: e.to_string(),
            }));
            return;
        }
    };

    info!(%url, "websocket connected");
    let _ = events.send(TransportEvent::Opened);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    for text in queued {
        debug!(bytes = text.len(), "sending queued frame");
        if let Err(e) = ws_sender.send(Message::Text(text)).await {
            warn!(error = %e, "websocket send failed");
            let _ = events.send(TransportEvent::Failed(TransportError::Disconnected {
                reason: e.to_string(),
            }));
            return;
        }
    }

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    debug!(bytes = text.len(), "sending frame");
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        warn!(error = %e, "websocket send failed");
                        let _ = events.send(TransportEvent::Failed(TransportError::Disconnected {
                            reason: e.to_string(),
                        }));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("closing websocket");
                    let _ = ws_sender.send(Message::Close(None)).await;
                    let _ = ws_sender.close().await;
                    return;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(bytes = text.len(), "received frame");
                    if events.send(TransportEvent::Frame(text)).is_err() {
                        // Session is gone; nobody will read further frames.
                        let _ = ws_sender.send(Message::Close(None)).await;
                        return;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(bytes = bytes.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                    info!(reason = ?reason, "websocket closed by remote");
                    let _ = events.send(TransportEvent::Closed { reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket receive failed");
                    let _ = events.send(TransportEvent::Failed(TransportError::Disconnected {
                        reason: e.to_string(),
                    }));
                    return;
                }
                None => {
                    info!("websocket stream ended");
                    let _ = events.send(TransportEvent::Closed { reason: None });
                    return;
                }
            },
        }
    }
}
