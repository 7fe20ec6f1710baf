//! Conversation state: messages, history store and change events.

pub mod event;
pub mod message;
pub mod store;

pub use event::{ConversationEvent, EventSink};
pub use message::{Attachment, Message, MessageRole};
pub use store::{ConversationStore, GREETING};
