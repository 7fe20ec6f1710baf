//! Conversation orchestration for Parley.
//!
//! [`ChatUseCase`] owns the history and decides, per input, whether to load a
//! dataset or answer from an image, the loaded dataset or a free-form chat.

pub mod chat_usecase;
pub mod grounding;

pub use chat_usecase::ChatUseCase;
pub use grounding::build_grounding_instruction;
