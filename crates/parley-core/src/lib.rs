//! Domain types and collaborator contracts for Parley.

pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod secret;
pub mod session;
pub mod stream;

// Re-export common error type
pub use error::{ParleyError, Result};

pub use dataset::{CellValue, CsvIngestor, CsvSource, LoadedDataset, ParsedCsv, Record};
pub use dispatch::{Strategy, decide};
pub use model::{
    ChatSession, Fragment, FragmentStream, GenerateRequest, ModelService, ModelServiceFactory,
    ModelTier, Part, ServiceRole, Turn,
};
pub use session::{
    Attachment, ConversationEvent, ConversationStore, EventSink, Message, MessageRole,
};
pub use stream::StreamAccumulator;
