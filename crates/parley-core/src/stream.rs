//! Folding a fragment stream into the pending assistant message.

use futures::StreamExt;

use crate::error::{ParleyError, Result};
use crate::model::FragmentStream;
use crate::session::{ConversationEvent, ConversationStore, EventSink, Message};

/// Prefix of the notice that replaces a failed reply.
pub const ERROR_NOTICE_PREFIX: &str = "Sorry, I encountered an error: ";

/// User-facing notice for a failed generation.
pub fn error_notice(error: &ParleyError) -> String {
    format!("{ERROR_NOTICE_PREFIX}{}", error.user_message())
}

/// Appends streamed fragments to one pending message, in arrival order.
///
/// Fragments are concatenated directly: nothing is buffered, reordered or
/// deduplicated. The first non-empty fragment clears the message's loading
/// flag; exhaustion settles it. Any failure, whether establishing or
/// consuming the stream, replaces the content with an error notice once.
pub struct StreamAccumulator<'a> {
    store: &'a mut ConversationStore,
    message_id: String,
    sink: &'a EventSink,
}

impl<'a> StreamAccumulator<'a> {
    pub fn new(
        store: &'a mut ConversationStore,
        message_id: impl Into<String>,
        sink: &'a EventSink,
    ) -> Self {
        Self {
            store,
            message_id: message_id.into(),
            sink,
        }
    }

    /// Drives `stream` to completion and returns the settled message.
    ///
    /// `stream` is the result of establishing the stream, so a failure to
    /// connect is handled the same way as a failure mid-stream.
    pub async fn accumulate(mut self, stream: Result<FragmentStream>) -> Result<Message> {
        let outcome = match stream {
            Ok(stream) => self.drain(stream).await,
            Err(err) => Err(err),
        };

        let settled = match outcome {
            Ok(()) => self.store.settle(&self.message_id)?.clone(),
            Err(err) => {
                tracing::error!(
                    message_id = %self.message_id,
                    "[StreamAccumulator] Error generating response: {}",
                    err
                );
                self.store
                    .fail(&self.message_id, error_notice(&err))?
                    .clone()
            }
        };

        self.sink
            .emit(ConversationEvent::MessageSettled(settled.clone()));
        Ok(settled)
    }

    async fn drain(&mut self, mut stream: FragmentStream) -> Result<()> {
        while let Some(fragment) = stream.next().await {
            let Some(text) = fragment?.text.filter(|text| !text.is_empty()) else {
                continue;
            };
            self.store.append(&self.message_id, &text)?;
            self.sink.emit(ConversationEvent::ContentAppended {
                id: self.message_id.clone(),
                text,
            });
        }
        Ok(())
    }
}
