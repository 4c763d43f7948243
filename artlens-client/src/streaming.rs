//! Stream reader for the generate endpoint's event stream.
//!
//! Turns the raw, arbitrarily-chunked response body into a lazy,
//! finite, forward-only sequence of [`StreamEvent`]s. The wire format
//! is one `data:` line per frame, frames separated by a blank line:
//!
//! ```text
//! data: {"token":"A "}
//!
//! data: {"token":"cat."}
//!
//! data: {"event":"eos"}
//! ```
//!
//! The reader is lenient by policy: frames without the `data: ` prefix
//! and payloads that fail to parse are logged and dropped, never fatal.
//! If the transport ends without an `eos` frame, a
//! [`StreamEvent::ConnectionClosed`] is synthesized as the final item.

use std::fmt::{self, Display};
use std::pin::Pin;
use std::task::{Context, Poll};

use artlens_core::StreamEvent;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

/// Literal prefix identifying a data frame.
const DATA_PREFIX: &str = "data: ";

/// Handle to a live event stream.
///
/// Lazy — events are decoded as bytes arrive — and forward-only: it is
/// consumed by value and cannot be restarted. Dropping it releases the
/// underlying response body.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
}

// Not derivable over the boxed stream.
impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

/// Decode a raw byte stream into an [`EventStream`].
///
/// Generic over the transport error type so tests can drive it with an
/// in-memory chunk sequence; the client passes `reqwest`'s body stream.
/// A transport-level read error surfaces as a final
/// [`StreamEvent::Error`].
pub fn parse_event_stream<S, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    EventStream {
        inner: Box::pin(event_stream(byte_stream)),
    }
}

fn event_stream<S, E>(byte_stream: S) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        let mut text_buf = String::new();
        let mut saw_eos = false;
        let mut bytes_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield StreamEvent::Error(format!("stream read error: {e}"));
                    return;
                }
            };

            decoder.push(&chunk, &mut text_buf);

            // Emit every complete frame; keep the trailing partial one.
            while let Some((pos, len)) = find_frame_boundary(&text_buf) {
                let frame = text_buf[..pos].to_string();
                text_buf.drain(..pos + len);
                if let Some(event) = parse_frame(&frame) {
                    saw_eos |= event == StreamEvent::EndOfStream;
                    yield event;
                }
            }
        }

        decoder.finish(&mut text_buf);

        // A final frame without its terminating blank line still counts.
        let remainder = std::mem::take(&mut text_buf);
        if !remainder.trim().is_empty() {
            if let Some(event) = parse_frame(&remainder) {
                saw_eos |= event == StreamEvent::EndOfStream;
                yield event;
            }
        }

        if !saw_eos {
            yield StreamEvent::ConnectionClosed;
        }
    }
}

/// Find the earliest frame delimiter — a blank line, in either `\n\n`
/// or `\r\n\r\n` form. Returns its byte position and length.
fn find_frame_boundary(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parse one delimited frame into an event, if it carries one.
fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let payload = frame
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .find_map(|l| l.strip_prefix(DATA_PREFIX));

    let Some(payload) = payload else {
        if !frame.trim().is_empty() {
            tracing::debug!(frame = %frame.trim(), "ignoring frame without data prefix");
        }
        return None;
    };

    decode_payload(payload.trim())
}

/// The three payload shapes a data frame may carry.
#[derive(Deserialize)]
struct FramePayload {
    token: Option<String>,
    error: Option<String>,
    event: Option<String>,
}

fn decode_payload(payload: &str) -> Option<StreamEvent> {
    let parsed: FramePayload = match serde_json::from_str(payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, payload = %payload, "dropping malformed frame payload");
            return None;
        }
    };

    if let Some(message) = parsed.error {
        Some(StreamEvent::Error(message))
    } else if let Some(token) = parsed.token {
        Some(StreamEvent::Token(token))
    } else if parsed.event.as_deref() == Some("eos") {
        Some(StreamEvent::EndOfStream)
    } else {
        tracing::warn!(payload = %payload, "dropping frame with unrecognized payload shape");
        None
    }
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two raw chunks is buffered and
/// completed before decoding; invalid sequences are replaced with
/// U+FFFD and logged rather than aborting the stream.
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Decode `chunk` into `out`, retaining an incomplete trailing
    /// character for the next chunk.
    fn push(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        // Possibly a character split across chunks; wait.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            tracing::warn!(bytes = bad, "replacing invalid UTF-8 in stream");
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }

    /// Flush at end of input. A character that never completed decodes
    /// as a single replacement character.
    fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            tracing::warn!(
                bytes = self.pending.len(),
                "stream ended inside a multi-byte character"
            );
            self.pending.clear();
            out.push('\u{FFFD}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    /// Feed the parser a body split into the given chunks and collect
    /// every event.
    async fn collect(chunks: Vec<Vec<u8>>) -> Vec<StreamEvent> {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, Infallible>(Bytes::from(c))),
        );
        parse_event_stream(stream).collect().await
    }

    async fn collect_one(body: &str) -> Vec<StreamEvent> {
        collect(vec![body.as_bytes().to_vec()]).await
    }

    #[test]
    fn event_stream_is_debuggable() {
        // `unwrap_err` on `Result<EventStream, _>` needs this.
        let stream =
            parse_event_stream(futures::stream::iter(Vec::<Result<Bytes, Infallible>>::new()));
        assert_eq!(format!("{stream:?}"), "EventStream { .. }");
    }

    const SCENARIO_BODY: &str =
        "data: {\"token\":\"A \"}\n\ndata: {\"token\":\"cat.\"}\n\ndata: {\"event\":\"eos\"}\n\n";

    #[tokio::test]
    async fn decodes_tokens_and_eos() {
        let events = collect_one(SCENARIO_BODY).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("A ".into()),
                StreamEvent::Token("cat.".into()),
                StreamEvent::EndOfStream,
            ]
        );
    }

    #[tokio::test]
    async fn byte_by_byte_chunking_is_equivalent() {
        let whole = collect_one(SCENARIO_BODY).await;
        let tiny = collect(
            SCENARIO_BODY
                .as_bytes()
                .iter()
                .map(|b| vec![*b])
                .collect(),
        )
        .await;
        assert_eq!(whole, tiny);
    }

    #[tokio::test]
    async fn split_inside_multibyte_character() {
        let body = "data: {\"token\":\"ch\u{00e2}teau \u{1f431}\"}\n\ndata: {\"event\":\"eos\"}\n\n";
        let whole = collect_one(body).await;
        // Split every chunk boundary inside the 4-byte cat emoji.
        let bytes = body.as_bytes();
        let emoji_start = body.find('\u{1f431}').unwrap();
        for offset in 1..4 {
            let cut = emoji_start + offset;
            let chunked = collect(vec![bytes[..cut].to_vec(), bytes[cut..].to_vec()]).await;
            assert_eq!(chunked, whole, "split at byte offset {cut}");
        }
    }

    #[tokio::test]
    async fn split_inside_frame_delimiter() {
        let body = SCENARIO_BODY;
        let cut = body.find("\n\n").unwrap() + 1;
        let chunked = collect(vec![
            body.as_bytes()[..cut].to_vec(),
            body.as_bytes()[cut..].to_vec(),
        ])
        .await;
        assert_eq!(chunked, collect_one(body).await);
    }

    #[tokio::test]
    async fn frames_without_data_prefix_are_ignored() {
        let body = ": keepalive\n\nevent: ping\n\ndata: {\"token\":\"hi\"}\n\ndata: {\"event\":\"eos\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![StreamEvent::Token("hi".into()), StreamEvent::EndOfStream]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_not_fatal() {
        let body = "data: {not json}\n\ndata: {\"token\":\"ok\"}\n\ndata: {\"event\":\"eos\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![StreamEvent::Token("ok".into()), StreamEvent::EndOfStream]
        );
    }

    #[tokio::test]
    async fn unrecognized_payload_shape_is_dropped() {
        let body = "data: {\"event\":\"warmup\"}\n\ndata: {\"event\":\"eos\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(events, vec![StreamEvent::EndOfStream]);
    }

    #[tokio::test]
    async fn error_frame_decodes() {
        let body = "data: {\"token\":\"A \"}\n\ndata: {\"error\":\"model crashed\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("A ".into()),
                StreamEvent::Error("model crashed".into()),
                StreamEvent::ConnectionClosed,
            ]
        );
    }

    #[tokio::test]
    async fn missing_eos_synthesizes_connection_closed() {
        let body = "data: {\"token\":\"partial\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("partial".into()),
                StreamEvent::ConnectionClosed,
            ]
        );
    }

    #[tokio::test]
    async fn empty_body_yields_only_connection_closed() {
        let events = collect_one("").await;
        assert_eq!(events, vec![StreamEvent::ConnectionClosed]);
    }

    #[tokio::test]
    async fn trailing_unterminated_frame_is_processed() {
        let body = "data: {\"token\":\"hi\"}\n\ndata: {\"event\":\"eos\"}";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![StreamEvent::Token("hi".into()), StreamEvent::EndOfStream]
        );
    }

    #[tokio::test]
    async fn crlf_delimiters_are_tolerated() {
        let body = "data: {\"token\":\"hi\"}\r\n\r\ndata: {\"event\":\"eos\"}\r\n\r\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![StreamEvent::Token("hi".into()), StreamEvent::EndOfStream]
        );
    }

    #[tokio::test]
    async fn eos_after_error_is_still_reported() {
        // The reader does not interpret ordering; the reconciler stops
        // at the first terminal event it cares about.
        let body = "data: {\"error\":\"boom\"}\n\ndata: {\"event\":\"eos\"}\n\n";
        let events = collect_one(body).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Error("boom".into()),
                StreamEvent::EndOfStream,
            ]
        );
    }
}
