//! Chat pane state: messages, transcript and the session controller

pub mod message;
pub mod session;
pub mod transcript;

pub use message::{Message, Role};
pub use session::{ChatSession, ConnectionFault, SendOutcome, SessionState, SessionUpdate};
pub use transcript::{Transcript, TranscriptStats};
