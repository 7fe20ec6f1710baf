//! Contract with the hosted model service.
//!
//! Two operation shapes are consumed: a stateless streaming generation and a
//! stateful chat session. Both hand back a [`FragmentStream`], a lazy, finite,
//! forward-only sequence of [`Fragment`]s.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};
use crate::session::Message;

/// The two selectable model tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Fast, budget-friendly default.
    #[default]
    Flash,
    /// Higher quality, slower.
    Pro,
}

impl ModelTier {
    /// Model identifier understood by the service.
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelTier::Flash => "gemini-2.5-flash",
            ModelTier::Pro => "gemini-2.5-pro",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Flash => write!(f, "flash"),
            ModelTier::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for ModelTier {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flash" | "gemini-2.5-flash" => Ok(ModelTier::Flash),
            "pro" | "gemini-2.5-pro" => Ok(ModelTier::Pro),
            other => Err(ParleyError::config(format!(
                "Unknown model '{other}' (expected 'flash' or 'pro')"
            ))),
        }
    }
}

/// Role vocabulary of the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    User,
    Model,
}

/// One piece of turn content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    /// Binary payload with its MIME type, sent inline.
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A single conversational turn as the service sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: ServiceRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ServiceRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ServiceRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Maps a user/assistant message onto a text turn; `None` for system messages.
    pub fn from_message(message: &Message) -> Option<Self> {
        message.role.service_role().map(|role| Self {
            role,
            parts: vec![Part::Text(message.content.clone())],
        })
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect()
    }
}

/// Stateless generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Turn>,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            contents,
            system_instruction: None,
            temperature: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One incremental unit of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: Option<String>,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Lazy, finite, non-restartable sequence of fragments in arrival order.
pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// The hosted generation endpoint.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Stateless streaming generation.
    async fn generate_content_stream(&self, request: GenerateRequest) -> Result<FragmentStream>;

    /// Creates a stateful chat context seeded with `history`.
    fn create_chat(&self, model: &str, history: Vec<Turn>) -> Box<dyn ChatSession>;
}

/// Stateful conversation held on the service side.
///
/// The session owns its replay of prior turns; callers only send the newest
/// user message.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Model this session was created for.
    fn model(&self) -> &str;

    /// Sends one user message and streams the reply.
    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream>;
}

/// Builds a model client; a missing credential surfaces here.
#[async_trait]
pub trait ModelServiceFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn ModelService>>;
}
