//! Structured error types for devpane
//!
//! One error enum for the whole library. The chat session itself only ever
//! produces `MalformedEndpoint` and `TransportFailure`; the remaining variants
//! belong to configuration, the backend probe and transcript export.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

/// Primary error type for devpane operations
#[derive(Error, Debug)]
pub enum DevpaneError {
    // =========================================================================
    // Chat session errors
    // =========================================================================
    /// The base address could not be turned into a channel address
    #[error("malformed endpoint '{input}': {reason}")]
    MalformedEndpoint { input: String, reason: String },

    /// The connection failed to open or broke while open
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    /// `initialize` was called on a session that already left `Uninitialized`
    #[error("chat session already initialized (state: {state})")]
    AlreadyInitialized { state: String },

    // =========================================================================
    // Configuration errors
    // =========================================================================
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // =========================================================================
    // External error wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DevpaneError {
    /// Whether trying again later could succeed.
    ///
    /// Nothing in the library acts on this: the chat session never retries.
    /// Callers that want reconnect behaviour can use it to decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportFailure(err) => err.is_retryable(),
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Self::MalformedEndpoint { .. }
            | Self::AlreadyInitialized { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigNotFound { .. }
            | Self::TomlParse(_)
            | Self::TomlSerialize(_)
            | Self::Json(_) => false,
        }
    }

    /// Stable short code, used in log fields and the chat pane status line
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEndpoint { .. } => "malformed_endpoint",
            Self::TransportFailure(_) => "transport_failure",
            Self::AlreadyInitialized { .. } => "already_initialized",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::ConfigNotFound { .. } => "config_not_found",
            Self::TomlParse(_) | Self::TomlSerialize(_) => "config_format",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Http(_) => "http",
        }
    }

    pub(crate) fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEndpoint {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using DevpaneError
pub type Result<T> = std::result::Result<T, DevpaneError>;
