//! Ordered conversation history.

use super::message::{Message, MessageRole};
use crate::error::{ParleyError, Result};

/// Assistant greeting shown at the start of every conversation.
pub const GREETING: &str = "Hello! How can I help you today? You can ask me anything, upload an image, or provide a CSV file for analysis by pasting its URL or uploading it.";

/// Ordered sequence of messages; insertion order is display order.
///
/// Messages are never reordered or deduplicated. At most one message is
/// `pending` at a time, and a pending message only accepts appends until it
/// is settled or failed.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding only the assistant greeting.
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Returns the id of the in-flight message, if any.
    pub fn pending_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.pending)
            .map(|m| m.id.as_str())
    }

    /// Appends a message to the end of the history.
    ///
    /// # Errors
    ///
    /// Returns `ParleyError::Busy` when `message` is pending and another
    /// pending message already exists.
    pub fn push(&mut self, message: Message) -> Result<&Message> {
        if message.pending && self.pending_id().is_some() {
            return Err(ParleyError::Busy);
        }
        self.messages.push(message);
        // Just pushed, so the vector is non-empty.
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Appends an empty assistant placeholder and returns its id.
    pub fn begin_pending(&mut self) -> Result<String> {
        let placeholder = Message::placeholder();
        let id = placeholder.id.clone();
        self.push(placeholder)?;
        Ok(id)
    }

    fn pending_mut(&mut self, id: &str) -> Result<&mut Message> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ParleyError::MessageNotFound(id.to_string()))?;
        if !message.pending {
            return Err(ParleyError::NoPendingMessage);
        }
        Ok(message)
    }

    /// Appends `text` to the pending message and clears its loading flag.
    ///
    /// Returns `true` when this was the first text the message received.
    pub fn append(&mut self, id: &str, text: &str) -> Result<bool> {
        let message = self.pending_mut(id)?;
        let first = message.loading;
        message.content.push_str(text);
        message.loading = false;
        Ok(first)
    }

    /// Marks the pending message as complete; its content is frozen from here on.
    pub fn settle(&mut self, id: &str) -> Result<&Message> {
        let message = self.pending_mut(id)?;
        message.pending = false;
        message.loading = false;
        Ok(message)
    }

    /// Replaces the pending message's content with `notice` and tags it errored.
    pub fn fail(&mut self, id: &str, notice: impl Into<String>) -> Result<&Message> {
        let message = self.pending_mut(id)?;
        message.content = notice.into();
        message.errored = true;
        message.pending = false;
        message.loading = false;
        Ok(message)
    }

    /// Clears render and lifecycle flags on `id` regardless of its state.
    ///
    /// Used as the unconditional cleanup step after a turn; a missing id is
    /// not an error.
    pub fn release(&mut self, id: &str) -> Option<&Message> {
        let message = self.messages.iter_mut().find(|m| m.id == id)?;
        message.pending = false;
        message.loading = false;
        Some(message)
    }

    /// Settled, non-errored, non-empty user/assistant messages in order,
    /// skipping the ids in `exclude`.
    pub fn replayable(&self, exclude: &[&str]) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.is_replayable() && !exclude.contains(&m.id.as_str()))
            .collect()
    }

    /// Every user/assistant message in order, skipping the ids in `exclude`.
    pub fn turns(&self, exclude: &[&str]) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| {
                matches!(m.role, MessageRole::User | MessageRole::Assistant)
                    && !exclude.contains(&m.id.as_str())
            })
            .collect()
    }

    /// Replaces the whole history.
    pub fn reset(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }
}
