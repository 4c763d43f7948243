//! Error taxonomy for the conversation store and the chat session.

use thiserror::Error;

/// A conversation store operation violated an invariant.
///
/// These indicate a caller bug (driving the store outside its state
/// machine), not a runtime condition — the store never mutates when it
/// returns one of these.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// A model turn is already in progress.
    #[error("a model turn is already in progress")]
    TurnInProgress,

    /// No model turn is in progress.
    #[error("no model turn is in progress")]
    NoTurnInProgress,

    /// The user message text is empty or whitespace-only.
    #[error("message text is empty")]
    EmptyMessage,
}

/// Errors surfaced by the chat session.
///
/// Every kind except [`ChatError::Validation`] terminates the current
/// turn and moves the session to `Errored`. None of them leave the
/// conversation store holding a partially-added turn — rollback happens
/// before the error is returned. Malformed stream frames are
/// deliberately absent here: they are logged and dropped by the stream
/// reader and never propagate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChatError {
    /// The submission was rejected before any network activity
    /// (empty input, no image captured, or a request already in flight).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request could not be sent or the response never arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server rejected request (HTTP {status}): {message}")]
    ServerRejected {
        /// HTTP status code of the rejection.
        status: u16,
        /// Server-provided error message, or a status-derived fallback.
        message: String,
    },

    /// An error event arrived mid-stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// A conversation store invariant was violated.
    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),
}

impl ChatError {
    /// The message to show the user for this error.
    ///
    /// Strips the taxonomy framing — the presentation layer renders
    /// this next to the conversation, not in a log.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation(msg)
            | ChatError::Transport(msg)
            | ChatError::Stream(msg) => msg.clone(),
            ChatError::ServerRejected { message, .. } => message.clone(),
            ChatError::Conversation(err) => err.to_string(),
        }
    }
}
