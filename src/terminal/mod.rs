//! Interactive chat pane
//!
//! Reads lines from stdin and events from the chat session in one loop, so
//! the session is only ever touched from this task.

pub mod pane;

use std::path::Path;

use anyhow::{Context, Result};
use devpane_core::chat::{ChatSession, SendOutcome, SessionUpdate};
use devpane_core::config::Config;
use devpane_core::transport::{Connector, WebSocketConnector};
use devpane_core::DevpaneError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use self::pane::{ChatPane, PaneInput};

/// Run the chat pane against the configured backend until stdin ends,
/// `/quit` is typed or Ctrl-C is pressed.
pub async fn run_chat(config: &Config, save: Option<&Path>, color: bool) -> Result<()> {
    let pane = ChatPane::new(&config.ui, color);
    let session = ChatSession::from_config(WebSocketConnector::new(), config);
    let input = BufReader::new(tokio::io::stdin());
    run_pane(session, &config.backend_url, &pane, input, save).await
}

async fn run_pane<C, R>(
    mut session: ChatSession<C>,
    backend_url: &str,
    pane: &ChatPane,
    input: R,
    save: Option<&Path>,
) -> Result<()>
where
    C: Connector,
    R: AsyncBufRead + Unpin,
{
    pane.print_banner(backend_url);
    if let Err(err) = session.initialize(backend_url) {
        pane.print_error(&err);
    }

    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("input closed");
                    break;
                };
                match PaneInput::parse(&line) {
                    PaneInput::Quit => break,
                    PaneInput::Help => pane.print_help(),
                    PaneInput::Stats => pane.print_status(pane.format_stats(
                        session.transcript().stats(),
                        session.frames_sent(),
                        session.frames_dropped(),
                    )),
                    PaneInput::State => {
                        pane.print_status(pane.format_state(session.state(), session.fault()))
                    }
                    PaneInput::Message(text) => {
                        if session.send_local(text) != SendOutcome::Blank {
                            if let Some(message) = session.transcript().last() {
                                pane.print_message(message);
                            }
                        }
                    }
                }
            }
            update = session.next_event(), if session.has_pending_events() => match update {
                Some(SessionUpdate::Appended(index)) => {
                    if let Some(message) = session.transcript().get(index) {
                        pane.print_message(message);
                    }
                }
                Some(SessionUpdate::Connected) => pane.print_status("connected"),
                Some(SessionUpdate::Closed { reason }) => pane.print_status(match reason {
                    Some(reason) => format!("connection closed: {reason}"),
                    None => "connection closed".to_string(),
                }),
                Some(SessionUpdate::Failed(err)) => pane.print_error(&DevpaneError::from(err)),
                Some(SessionUpdate::Ignored) | None => {}
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }

    session.teardown();

    if let Some(path) = save {
        session
            .transcript()
            .save(path)
            .with_context(|| format!("Failed to save transcript to {}", path.display()))?;
        pane.print_status(format!("transcript saved to {}", path.display()));
    }

    Ok(())
}
