//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, attachments and the lifecycle flags of the in-flight reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ServiceRole;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message (dataset load progress and failures).
    System,
}

impl MessageRole {
    /// Returns the role name used by the model service, if the role takes
    /// part in model conversations at all.
    pub fn service_role(&self) -> Option<ServiceRole> {
        match self {
            MessageRole::User => Some(ServiceRole::User),
            MessageRole::Assistant => Some(ServiceRole::Model),
            MessageRole::System => None,
        }
    }
}

/// An image attached to a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name (usually the file name).
    pub name: String,
    /// MIME type sent alongside the payload.
    pub mime_type: String,
    /// Raw image bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// A single message in a conversation history.
///
/// `pending` marks the in-flight assistant reply; its content only grows
/// while it is set. `loading` is the render-side indicator and is cleared as
/// soon as the first fragment arrives, while `pending` stays set until the
/// stream is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub errored: bool,
}

impl Message {
    /// Creates a settled message with a fresh id.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            attachment: None,
            pending: false,
            loading: false,
            errored: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Empty assistant placeholder awaiting its first fragment.
    pub fn placeholder() -> Self {
        Self {
            pending: true,
            loading: true,
            ..Self::assistant("")
        }
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_error(mut self) -> Self {
        self.errored = true;
        self
    }

    /// True for settled, non-errored, non-empty user or assistant messages.
    pub fn is_replayable(&self) -> bool {
        self.role.service_role().is_some()
            && !self.pending
            && !self.loading
            && !self.errored
            && !self.content.is_empty()
    }
}
