//! Console rendering of the chat pane

use console::Style;
use devpane_core::chat::{ConnectionFault, Message, Role, SessionState, TranscriptStats};
use devpane_core::config::UiConfig;
use devpane_core::DevpaneError;

/// A line typed into the pane, after command parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneInput<'a> {
    Quit,
    Stats,
    State,
    Help,
    Message(&'a str),
}

impl<'a> PaneInput<'a> {
    /// Known slash commands are handled locally; everything else is chat text
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => PaneInput::Quit,
            "/stats" => PaneInput::Stats,
            "/state" => PaneInput::State,
            "/help" => PaneInput::Help,
            _ => PaneInput::Message(line),
        }
    }
}

/// Formats transcript entries and status lines
pub struct ChatPane {
    show_roles: bool,
    local_label: String,
    remote_label: String,
    local: Style,
    remote: Style,
    status: Style,
    error: Style,
}

impl ChatPane {
    pub fn new(ui: &UiConfig, color: bool) -> Self {
        let styled = |style: Style| if color { style } else { Style::new() };
        Self {
            show_roles: ui.show_roles,
            local_label: ui.local_label.clone(),
            remote_label: ui.remote_label.clone(),
            local: styled(Style::new().white().bold()),
            remote: styled(Style::new().cyan()),
            status: styled(Style::new().dim()),
            error: styled(Style::new().red()),
        }
    }

    pub fn format_message(&self, message: &Message) -> String {
        let (label, style) = match message.role() {
            Role::Local => (&self.local_label, &self.local),
            Role::Remote => (&self.remote_label, &self.remote),
        };
        if self.show_roles {
            format!("{} {}", style.apply_to(format!("{label}:")), message.content())
        } else {
            style.apply_to(message.content()).to_string()
        }
    }

    pub fn print_message(&self, message: &Message) {
        println!("{}", self.format_message(message));
    }

    pub fn print_status(&self, text: impl AsRef<str>) {
        println!("{}", self.status.apply_to(format!("-- {}", text.as_ref())));
    }

    pub fn print_error(&self, err: &DevpaneError) {
        println!(
            "{}",
            self.error.apply_to(format!("-- [{}] {}", err.code(), err))
        );
    }

    pub fn print_banner(&self, backend_url: &str) {
        self.print_status(format!("devpane chat → {backend_url}  (/help for commands)"));
    }

    pub fn print_help(&self) {
        self.print_status("/stats  message counts");
        self.print_status("/state  connection state");
        self.print_status("/quit   end the session (or Ctrl-D)");
    }

    pub fn format_stats(&self, stats: TranscriptStats, sent: u64, dropped: u64) -> String {
        format!(
            "{} messages ({} {}, {} {}), {} frames sent, {} dropped",
            stats.total(),
            stats.local,
            self.local_label,
            stats.remote,
            self.remote_label,
            sent,
            dropped
        )
    }

    pub fn format_state(&self, state: SessionState, fault: Option<&ConnectionFault>) -> String {
        match fault {
            Some(fault) => format!("{state} ({fault})"),
            None => state.to_string(),
        }
    }
}
