#![deny(missing_docs)]
//! Core data model for artlens — an image-grounded streaming chat client.
//!
//! This crate holds the protocol-free half of the system: the
//! [`Conversation`] store and its invariants, captured [`ImageRef`]s and
//! the [`ImageSource`] collaborator boundary, decoded [`StreamEvent`]s,
//! the [`SessionState`] lifecycle, and the error taxonomy. The network
//! half (request encoding, stream decoding, the reconciler) lives in
//! `artlens-client`.

pub mod error;
pub mod event;
pub mod image;
pub mod session;
pub mod turn;

// Re-exports
pub use error::{ChatError, ConversationError};
pub use event::StreamEvent;
pub use image::{ImageRef, ImageSource};
pub use session::SessionState;
pub use turn::{Conversation, Role, Turn, NO_OUTPUT_FALLBACK};
