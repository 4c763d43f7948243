//! Session lifecycle state, owned by the reconciler.

/// Where the session is in its request/stream lifecycle.
///
/// `Idle → AwaitingFirstByte → Streaming → {Idle | Errored}`.
/// `Errored` is recoverable: a new submission moves the session back
/// to `AwaitingFirstByte`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No request in flight; ready to accept a submission.
    #[default]
    Idle,
    /// Request sent; response headers not yet received.
    AwaitingFirstByte,
    /// Response accepted; consuming the event stream.
    Streaming,
    /// The last turn failed; ready to accept a resubmission.
    Errored,
}

impl SessionState {
    /// Whether a request is in flight. Submission is rejected while busy.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingFirstByte | SessionState::Streaming
        )
    }
}
