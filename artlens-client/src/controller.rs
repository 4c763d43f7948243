//! The stream reconciler — the state machine between the event stream
//! and the conversation store.
//!
//! The model turn is inserted optimistically as soon as the response is
//! accepted so the presentation layer can render a "model is
//! responding" placeholder. Every failure path therefore has to undo
//! that optimism: a rejected request rolls back the user turn, a
//! stream error discards the model turn when it is still empty, and
//! both end-of-stream and an unsignaled close funnel into the same
//! fallback-fill so equivalent outcomes produce identical
//! conversations.
//!
//! Replacing the image while a stream is live must not let stale
//! events mutate the fresh conversation. Each submission captures the
//! epoch at submit time and re-checks it before applying any event;
//! `attach_image` bumps the epoch, so a superseded stream drops itself
//! (releasing the response body) the next time it looks.

use artlens_core::{
    ChatError, Conversation, ImageRef, Role, SessionState, StreamEvent, Turn, NO_OUTPUT_FALLBACK,
};
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::client::VlmClient;

/// Streaming conversation controller.
///
/// Owns the conversation store exclusively; the image adapter and the
/// presentation layer request mutations through the operations here and
/// read through the accessors. Submission is single-flight: while a
/// request is in progress, further submissions are rejected.
pub struct ChatController {
    client: VlmClient,
    state: Mutex<ChatState>,
}

/// Everything behind the lock. Critical sections are short and never
/// held across an await on the network.
#[derive(Debug, Default)]
struct ChatState {
    conversation: Conversation,
    session: SessionState,
    image: Option<ImageRef>,
    chat_mode: bool,
    epoch: u64,
    last_error: Option<String>,
}

impl ChatController {
    /// Create a controller around the given client.
    pub fn new(client: VlmClient) -> Self {
        Self {
            client,
            state: Mutex::new(ChatState::default()),
        }
    }

    /// Attach a freshly captured image.
    ///
    /// Resets the conversation, exits chat mode, clears any surfaced
    /// error, and advances the epoch so events from a stream started
    /// under the previous image are silently discarded.
    pub async fn attach_image(&self, image: ImageRef) {
        let mut state = self.state.lock().await;
        state.image = Some(image);
        state.conversation.reset();
        state.chat_mode = false;
        state.session = SessionState::Idle;
        state.last_error = None;
        state.epoch += 1;
        tracing::debug!(epoch = state.epoch, "image attached, conversation reset");
    }

    /// Submit a user message and drive the response stream to
    /// completion.
    ///
    /// Returns once the model turn is finalized or the turn has failed;
    /// the conversation is consistent either way. Rejected before any
    /// mutation when `text` is blank, no image is attached, or a
    /// submission is already in flight.
    pub async fn submit(&self, text: &str) -> Result<(), ChatError> {
        // Validate and optimistically append the user turn.
        let (snapshot, image, epoch) = {
            let mut state = self.state.lock().await;
            if state.session.is_busy() {
                return Err(ChatError::Validation(
                    "a response is still in progress".into(),
                ));
            }
            if text.trim().is_empty() {
                return Err(ChatError::Validation("message text is empty".into()));
            }
            let Some(image) = state.image.clone() else {
                return Err(ChatError::Validation("no image has been captured".into()));
            };
            state.conversation.append_user(text)?;
            state.session = SessionState::AwaitingFirstByte;
            state.last_error = None;
            (state.conversation.turns().to_vec(), image, state.epoch)
        };

        // Send without holding the lock.
        let stream = match self.client.generate(&snapshot, &image).await {
            Ok(stream) => stream,
            Err(err) => {
                let mut state = self.state.lock().await;
                if state.epoch == epoch {
                    // Roll back the optimistic user turn.
                    state.conversation.discard_last_if(|t| t.role == Role::User);
                    state.session = SessionState::Errored;
                    state.last_error = Some(err.user_message());
                }
                return Err(err);
            }
        };

        // Accepted: open the model turn so the UI can show a
        // placeholder while tokens arrive.
        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                tracing::warn!("dropping response stream for a superseded image");
                return Ok(());
            }
            state.chat_mode = true;
            state.conversation.begin_model_turn()?;
            state.session = SessionState::Streaming;
        }

        let mut stream = stream;
        while let Some(event) = stream.next().await {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                tracing::warn!("dropping stale stream event after image reset");
                return Ok(());
            }
            match event {
                StreamEvent::Token(token) => {
                    state.conversation.append_token(&token)?;
                }
                StreamEvent::Error(message) => {
                    // An empty model turn is discarded; accumulated
                    // partial output is kept and finalized so the user
                    // does not lose already-rendered tokens.
                    let discarded = state
                        .conversation
                        .discard_last_if(|t| t.role == Role::Model && t.is_blank());
                    if !discarded {
                        state.conversation.finalize_model_turn(NO_OUTPUT_FALLBACK)?;
                    }
                    state.session = SessionState::Errored;
                    state.last_error = Some(message.clone());
                    return Err(ChatError::Stream(message));
                }
                StreamEvent::EndOfStream | StreamEvent::ConnectionClosed => {
                    state.conversation.finalize_model_turn(NO_OUTPUT_FALLBACK)?;
                    state.session = SessionState::Idle;
                    return Ok(());
                }
            }
        }

        // The reader always ends with a terminal event, so this only
        // runs if the stream was exhausted out from under us; treat it
        // like an unsignaled close.
        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.conversation.finalize_model_turn(NO_OUTPUT_FALLBACK)?;
            state.session = SessionState::Idle;
        }
        Ok(())
    }

    /// Current session state.
    pub async fn session(&self) -> SessionState {
        self.state.lock().await.session
    }

    /// Snapshot of the conversation turns.
    pub async fn turns(&self) -> Vec<Turn> {
        self.state.lock().await.conversation.turns().to_vec()
    }

    /// Whether a first response has been accepted for the current
    /// image.
    pub async fn in_chat_mode(&self) -> bool {
        self.state.lock().await.chat_mode
    }

    /// The most recently surfaced user-visible error, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }
}
