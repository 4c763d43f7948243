//! Internal helpers for mapping HTTP failures to [`ChatError`].

use artlens_core::ChatError;
use reqwest::StatusCode;

/// Map a [`reqwest::Error`] raised while sending the request.
pub(crate) fn map_send_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Transport("request timed out".into())
    } else if err.is_connect() {
        ChatError::Transport(format!("could not reach server: {err}"))
    } else {
        ChatError::Transport(err.to_string())
    }
}

/// Extract the server's `error` field from a rejection body.
///
/// The server answers rejections with `{"error": "..."}`; an absent or
/// unparseable body falls back to a message derived from the status.
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("request failed with HTTP status {}", status.as_u16()))
}
