//! Decoded wire events from the response stream.

/// An event decoded from the response body by the stream reader.
///
/// Only the stream reader constructs these; the reconciler consumes
/// them and applies them to the conversation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental piece of model output.
    Token(String),
    /// The server reported an error mid-stream.
    Error(String),
    /// The server signaled the end of the response.
    EndOfStream,
    /// The transport ended without a prior [`StreamEvent::EndOfStream`].
    ///
    /// Synthesized by the stream reader as the final item so the
    /// consumer sees exactly one terminal event per stream.
    ConnectionClosed,
}
