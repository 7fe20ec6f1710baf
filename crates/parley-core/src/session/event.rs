//! Notifications emitted toward the front-end as the conversation changes.

use serde::Serialize;
use tokio::sync::mpsc;

use super::message::Message;
use crate::model::ModelTier;

/// A single state change, emitted in mutation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ConversationEvent {
    /// A message was appended to the history.
    MessageAdded(Message),
    /// Text was appended to the pending message.
    ContentAppended { id: String, text: String },
    /// The pending message reached its final state (complete or errored).
    MessageSettled(Message),
    /// The history was replaced wholesale.
    ConversationReset(Vec<Message>),
    /// The in-flight flag changed.
    BusyChanged(bool),
    /// The loaded dataset changed; carries its display name.
    DatasetChanged(Option<String>),
    /// The selected model tier changed.
    ModelChanged(ModelTier),
}

/// Non-blocking outlet for [`ConversationEvent`]s.
///
/// A sink without a receiver (or whose receiver was dropped) silently
/// discards events; the conversation state stays authoritative.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<ConversationEvent>>,
}

impl EventSink {
    pub fn new(sender: mpsc::UnboundedSender<ConversationEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that drops everything.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ConversationEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
