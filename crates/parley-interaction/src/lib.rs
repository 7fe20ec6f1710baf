//! Model service clients.

pub mod gemini_api_agent;
pub mod sse;

pub use gemini_api_agent::{GeminiApiClient, GeminiChatSession, GeminiServiceFactory};
