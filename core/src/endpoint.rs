//! Endpoint derivation
//!
//! Turns the HTTP(S) base address the shell is configured with into the
//! WebSocket address of the chat channel.

use reqwest::Url;

use crate::error::{DevpaneError, Result};

/// Base address used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Path of the chat channel, appended to the base address
pub const DEFAULT_CHAT_PATH: &str = "/ws/chat";

/// Map an address scheme to its streaming-transport equivalent.
///
/// Already-streaming schemes map to themselves so a `ws://` base is accepted
/// as-is.
fn streaming_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" | "ws" => Some("ws"),
        "https" | "wss" => Some("wss"),
        _ => None,
    }
}

/// Derive the chat channel address from a base address.
///
/// `http://host:port` becomes `ws://host:port/ws/chat` and
/// `https://host:port` becomes `wss://host:port/ws/chat`. A path prefix on the
/// base is kept (`http://h/api` → `ws://h/api/ws/chat`); trailing slashes,
/// query and fragment are dropped.
pub fn derive_channel_url(base: &str, chat_path: &str) -> Result<Url> {
    let input = base.trim();
    if input.is_empty() {
        return Err(DevpaneError::malformed(base, "empty address"));
    }

    let mut url = Url::parse(input).map_err(|e| DevpaneError::malformed(base, e.to_string()))?;

    let scheme = streaming_scheme(url.scheme()).ok_or_else(|| {
        DevpaneError::malformed(base, format!("unsupported scheme '{}'", url.scheme()))
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(DevpaneError::malformed(base, "missing host"));
    }

    url.set_scheme(scheme)
        .map_err(|_| DevpaneError::malformed(base, format!("cannot switch scheme to '{scheme}'")))?;

    let prefix = url.path().trim_end_matches('/').to_string();
    let suffix = if chat_path.starts_with('/') {
        chat_path.to_string()
    } else {
        format!("/{chat_path}")
    };
    url.set_path(&format!("{prefix}{suffix}"));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
