//! The conversation store — ordered turns plus the single mutable
//! in-progress model turn.
//!
//! All access to the in-progress turn goes through the operations here.
//! Callers never reach into the sequence positionally; the store is the
//! only place that knows which turn is open.

use serde::{Deserialize, Serialize};

use crate::error::ConversationError;

/// Placeholder content substituted when the model produced no visible
/// output before the stream ended.
pub const NO_OUTPUT_FALLBACK: &str = "The model produced no output.";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human user.
    User,
    /// The model.
    Model,
}

/// One message in the conversation.
///
/// Immutable once a later turn is appended. The single exception is
/// the trailing model turn while it is in progress, which accumulates
/// streamed tokens through [`Conversation::append_token`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn.
    pub role: Role,
    /// The turn's text content.
    pub content: String,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a model turn.
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }

    /// Whether the content is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Ordered conversation history with at most one in-progress model turn.
///
/// Invariants:
/// - at most one model turn is in progress at any time;
/// - a user turn may only be appended when nothing is in progress;
/// - the in-progress turn is always the trailing turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    in_progress: bool,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn.
    ///
    /// Fails if a model turn is in progress or `text` is blank.
    pub fn append_user(&mut self, text: &str) -> Result<(), ConversationError> {
        if self.in_progress {
            return Err(ConversationError::TurnInProgress);
        }
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        self.turns.push(Turn::user(text));
        Ok(())
    }

    /// Open an empty, in-progress model turn.
    ///
    /// Fails if one is already in progress.
    pub fn begin_model_turn(&mut self) -> Result<(), ConversationError> {
        if self.in_progress {
            return Err(ConversationError::TurnInProgress);
        }
        self.turns.push(Turn::model(""));
        self.in_progress = true;
        Ok(())
    }

    /// Concatenate `text` onto the in-progress model turn.
    pub fn append_token(&mut self, text: &str) -> Result<(), ConversationError> {
        if !self.in_progress {
            return Err(ConversationError::NoTurnInProgress);
        }
        if let Some(last) = self.turns.last_mut() {
            last.content.push_str(text);
        }
        Ok(())
    }

    /// Mark the in-progress model turn complete.
    ///
    /// If its content is empty or whitespace-only it is replaced with
    /// `fallback`, so an unsignaled close and an explicit end-of-stream
    /// produce identical conversations.
    pub fn finalize_model_turn(&mut self, fallback: &str) -> Result<(), ConversationError> {
        if !self.in_progress {
            return Err(ConversationError::NoTurnInProgress);
        }
        if let Some(last) = self.turns.last_mut() {
            if last.is_blank() {
                last.content = fallback.to_string();
            }
        }
        self.in_progress = false;
        Ok(())
    }

    /// Remove the trailing turn if `predicate` holds for it.
    ///
    /// Returns whether a turn was removed. Used to roll back an
    /// optimistically-appended user turn after a rejected request, and
    /// to drop an empty model turn after a stream-level error. Removing
    /// the trailing turn closes any in-progress turn, since only the
    /// trailing turn can be open.
    pub fn discard_last_if<F>(&mut self, predicate: F) -> bool
    where
        F: FnOnce(&Turn) -> bool,
    {
        let discard = self.turns.last().is_some_and(predicate);
        if discard {
            self.turns.pop();
            self.in_progress = false;
        }
        discard
    }

    /// Clear all turns. Used when a new image is captured.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.in_progress = false;
    }

    /// The turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The trailing turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns, counting an in-progress one.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether a model turn is currently in progress.
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_user_rejects_blank_text() {
        let mut conv = Conversation::new();
        assert_eq!(conv.append_user(""), Err(ConversationError::EmptyMessage));
        assert_eq!(
            conv.append_user("   \n"),
            Err(ConversationError::EmptyMessage)
        );
        assert!(conv.is_empty());
    }

    #[test]
    fn append_user_rejected_while_model_turn_open() {
        let mut conv = Conversation::new();
        conv.append_user("hi").unwrap();
        conv.begin_model_turn().unwrap();
        assert_eq!(
            conv.append_user("again"),
            Err(ConversationError::TurnInProgress)
        );
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn only_one_model_turn_in_progress() {
        let mut conv = Conversation::new();
        conv.append_user("hi").unwrap();
        conv.begin_model_turn().unwrap();
        assert_eq!(
            conv.begin_model_turn(),
            Err(ConversationError::TurnInProgress)
        );
    }

    #[test]
    fn append_token_requires_open_turn() {
        let mut conv = Conversation::new();
        assert_eq!(
            conv.append_token("x"),
            Err(ConversationError::NoTurnInProgress)
        );
    }

    #[test]
    fn tokens_accumulate_on_open_turn() {
        let mut conv = Conversation::new();
        conv.append_user("describe").unwrap();
        conv.begin_model_turn().unwrap();
        conv.append_token("A ").unwrap();
        conv.append_token("cat.").unwrap();
        conv.finalize_model_turn(NO_OUTPUT_FALLBACK).unwrap();
        assert_eq!(conv.last().unwrap().content, "A cat.");
        assert!(!conv.in_progress());
    }

    #[test]
    fn finalize_fills_fallback_when_blank() {
        let mut conv = Conversation::new();
        conv.append_user("describe").unwrap();
        conv.begin_model_turn().unwrap();
        conv.append_token("  ").unwrap();
        conv.finalize_model_turn(NO_OUTPUT_FALLBACK).unwrap();
        assert_eq!(conv.last().unwrap().content, NO_OUTPUT_FALLBACK);
    }

    #[test]
    fn finalize_requires_open_turn() {
        let mut conv = Conversation::new();
        assert_eq!(
            conv.finalize_model_turn(NO_OUTPUT_FALLBACK),
            Err(ConversationError::NoTurnInProgress)
        );
    }

    #[test]
    fn discard_rolls_back_user_turn() {
        let mut conv = Conversation::new();
        conv.append_user("hello").unwrap();
        let before = conv.clone();
        conv.append_user("failed send").unwrap();
        assert!(conv.discard_last_if(|t| t.role == Role::User));
        assert_eq!(conv, before);
    }

    #[test]
    fn discard_drops_empty_model_turn_and_closes_it() {
        let mut conv = Conversation::new();
        conv.append_user("hi").unwrap();
        conv.begin_model_turn().unwrap();
        assert!(conv.discard_last_if(|t| t.role == Role::Model && t.is_blank()));
        assert!(!conv.in_progress());
        assert_eq!(conv.len(), 1);
        // A new turn can be opened afterwards.
        conv.begin_model_turn().unwrap();
    }

    #[test]
    fn discard_keeps_turn_when_predicate_fails() {
        let mut conv = Conversation::new();
        conv.append_user("hi").unwrap();
        conv.begin_model_turn().unwrap();
        conv.append_token("partial").unwrap();
        assert!(!conv.discard_last_if(|t| t.role == Role::Model && t.is_blank()));
        assert_eq!(conv.len(), 2);
        assert!(conv.in_progress());
    }

    #[test]
    fn reset_clears_everything() {
        let mut conv = Conversation::new();
        conv.append_user("hi").unwrap();
        conv.begin_model_turn().unwrap();
        conv.reset();
        assert!(conv.is_empty());
        assert!(!conv.in_progress());
    }

    #[test]
    fn turns_serialize_with_lowercase_roles() {
        let turns = vec![Turn::user("hi"), Turn::model("hello")];
        let json = serde_json::to_string(&turns).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"model","content":"hello"}]"#
        );
    }
}
