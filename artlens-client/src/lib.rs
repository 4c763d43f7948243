#![deny(missing_docs)]
//! Streaming conversation client for the artlens generate endpoint.
//!
//! [`VlmClient`] sends the conversation plus the captured image as one
//! multipart request; [`streaming`] decodes the chunked `data:`-framed
//! response body into [`artlens_core::StreamEvent`]s; and
//! [`ChatController`] is the state machine that reconciles those events
//! (and every failure path) into a consistent conversation.

pub mod client;
pub mod controller;
pub(crate) mod error;
pub mod request;
pub mod streaming;

pub use client::VlmClient;
pub use controller::ChatController;
pub use streaming::EventStream;

// Re-export the core model for convenience
pub use artlens_core::{
    ChatError, Conversation, ConversationError, ImageRef, ImageSource, Role, SessionState,
    StreamEvent, Turn, NO_OUTPUT_FALLBACK,
};
