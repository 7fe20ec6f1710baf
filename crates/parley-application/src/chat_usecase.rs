//! Chat use case implementation.
//!
//! This module provides the `ChatUseCase` which owns the conversation state
//! (history, loaded dataset, chat session, selected model) and routes every
//! submission to one of the answering strategies. Each turn streams its reply
//! into a single placeholder message and always releases the busy flag when
//! it finishes, whatever the outcome.

use std::sync::Arc;

use parley_core::dispatch::image_prompt;
use parley_core::session::GREETING;
use parley_core::{
    Attachment, ChatSession, ConversationEvent, ConversationStore, CsvIngestor, CsvSource,
    EventSink, FragmentStream, GenerateRequest, LoadedDataset, Message, ModelService,
    ModelServiceFactory, ModelTier, ParleyError, Part, Result, ServiceRole, Strategy,
    StreamAccumulator, Turn, decide,
};

use crate::grounding::{GROUNDED_TEMPERATURE, build_grounding_instruction};

/// Use case for a single-user conversation with the model.
///
/// # Responsibilities
///
/// - Gating submissions while a request is in flight
/// - Dispatching input to dataset load, image, dataset or free-form answering
/// - Maintaining the lazily created chat session and invalidating it when the
///   model or dataset changes
/// - Emitting [`ConversationEvent`]s in mutation order
///
/// Every mutating operation takes `&mut self`; callers that share the use
/// case across tasks wrap it in a `tokio::sync::Mutex`.
pub struct ChatUseCase {
    /// Ordered conversation history
    store: ConversationStore,
    /// Dataset grounding subsequent turns, if any
    dataset: Option<LoadedDataset>,
    /// Free-form chat context, created on first use
    session: Option<Box<dyn ChatSession>>,
    /// Tier used for free-form and dataset turns
    model: ModelTier,
    /// True while a turn or dataset load is in flight
    busy: bool,
    /// Builds the model client for each turn
    model_factory: Arc<dyn ModelServiceFactory>,
    /// Fetches and parses CSV sources
    csv_ingestor: Arc<dyn CsvIngestor>,
    /// Outlet for change notifications
    sink: EventSink,
}

impl ChatUseCase {
    /// Creates a new `ChatUseCase` whose history holds only the greeting.
    ///
    /// # Arguments
    ///
    /// * `model_factory` - Builds a model client per turn; a missing credential
    ///   surfaces as that turn's error notice
    /// * `csv_ingestor` - Fetches and parses CSV sources
    /// * `model` - Initially selected tier
    /// * `sink` - Receives change notifications
    pub fn new(
        model_factory: Arc<dyn ModelServiceFactory>,
        csv_ingestor: Arc<dyn CsvIngestor>,
        model: ModelTier,
        sink: EventSink,
    ) -> Self {
        Self {
            store: ConversationStore::with_greeting(),
            dataset: None,
            session: None,
            model,
            busy: false,
            model_factory,
            csv_ingestor,
            sink,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn dataset(&self) -> Option<&LoadedDataset> {
        self.dataset.as_ref()
    }

    pub fn model(&self) -> ModelTier {
        self.model
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether a free-form chat session currently exists.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Submits one user input, optionally with an image, and returns the
    /// strategy that answered it.
    ///
    /// Only [`ParleyError::Busy`] is returned as an error; every other failure
    /// ends up in the conversation as an errored message.
    pub async fn send_message(
        &mut self,
        text: &str,
        image: Option<Attachment>,
    ) -> Result<Strategy> {
        self.ensure_idle()?;

        let strategy = decide(text, image.as_ref(), self.dataset.as_ref());
        tracing::debug!("[ChatUseCase] Dispatching input as {:?}", strategy);

        if let Strategy::DatasetLoad { url } = &strategy {
            self.load_dataset(CsvSource::Url(url.clone())).await?;
            return Ok(strategy);
        }

        self.set_busy(true);
        let outcome = self.run_turn(&strategy, text, image).await;
        if let Some(id) = self.store.pending_id().map(str::to_string) {
            self.store.release(&id);
        }
        self.set_busy(false);

        if let Err(err) = outcome {
            tracing::error!("[ChatUseCase] Turn aborted: {}", err);
        }
        Ok(strategy)
    }

    /// Loads a dataset from `source`, replacing any previous one.
    ///
    /// Progress and outcome are reported as system messages. On success the
    /// chat session is discarded; on failure the previous dataset is cleared.
    pub async fn load_dataset(&mut self, source: CsvSource) -> Result<()> {
        self.ensure_idle()?;

        self.set_busy(true);
        self.run_load(source).await;
        self.set_busy(false);
        Ok(())
    }

    /// Resets the history to the greeting and clears the session and dataset.
    pub fn new_conversation(&mut self) -> Result<()> {
        self.ensure_idle()?;

        self.store.reset(vec![Message::assistant(GREETING)]);
        self.session = None;
        self.clear_dataset();
        self.sink.emit(ConversationEvent::ConversationReset(
            self.store.messages().to_vec(),
        ));
        tracing::info!("[ChatUseCase] Started a new conversation");
        Ok(())
    }

    /// Switches the model tier; the chat session is always discarded.
    pub fn select_model(&mut self, model: ModelTier) -> Result<()> {
        self.ensure_idle()?;

        self.model = model;
        self.session = None;
        self.sink.emit(ConversationEvent::ModelChanged(model));
        tracing::info!("[ChatUseCase] Selected model: {}", model.model_id());
        Ok(())
    }

    async fn run_turn(
        &mut self,
        strategy: &Strategy,
        text: &str,
        image: Option<Attachment>,
    ) -> Result<()> {
        let user = Message::user(text).with_attachment(image.clone());
        let user_id = user.id.clone();
        self.add_message(user)?;

        let pending_id = self.store.begin_pending()?;
        if let Some(placeholder) = self.store.get(&pending_id) {
            self.sink
                .emit(ConversationEvent::MessageAdded(placeholder.clone()));
        }

        let stream = self
            .open_stream(
                strategy,
                text,
                image.as_ref(),
                &[user_id.as_str(), pending_id.as_str()],
            )
            .await;

        StreamAccumulator::new(&mut self.store, pending_id, &self.sink)
            .accumulate(stream)
            .await?;
        Ok(())
    }

    /// Establishes the reply stream for `strategy`.
    ///
    /// `exclude` names the ids of the current user message and placeholder,
    /// which never belong to the replayed history.
    async fn open_stream(
        &mut self,
        strategy: &Strategy,
        text: &str,
        image: Option<&Attachment>,
        exclude: &[&str],
    ) -> Result<FragmentStream> {
        let service = self.model_factory.create().await?;

        match strategy {
            Strategy::ImageOneShot => {
                let image = image.ok_or_else(|| {
                    ParleyError::internal("Image strategy selected without an attachment")
                })?;
                Self::image_stream(service.as_ref(), image, text).await
            }
            Strategy::DatasetOneShot => {
                let dataset = self.dataset.as_ref().ok_or_else(|| {
                    ParleyError::internal("Dataset strategy selected without a dataset")
                })?;
                let instruction = build_grounding_instruction(dataset)?;

                let mut contents: Vec<Turn> = self
                    .store
                    .turns(exclude)
                    .into_iter()
                    .filter_map(Turn::from_message)
                    .collect();
                contents.push(Turn::user_text(text));

                let request = GenerateRequest::new(self.model.model_id(), contents)
                    .with_system_instruction(instruction)
                    .with_temperature(GROUNDED_TEMPERATURE);
                service.generate_content_stream(request).await
            }
            Strategy::FreeFormChat => {
                if self.session.is_none() {
                    let history: Vec<Turn> = self
                        .store
                        .replayable(exclude)
                        .into_iter()
                        .filter_map(Turn::from_message)
                        .collect();
                    tracing::info!(
                        "[ChatUseCase] Creating chat session for {} with {} replayed turns",
                        self.model.model_id(),
                        history.len()
                    );
                    self.session = Some(service.create_chat(self.model.model_id(), history));
                }
                match &self.session {
                    Some(session) => session.send_message_stream(text).await,
                    None => Err(ParleyError::internal("Chat session unavailable")),
                }
            }
            Strategy::DatasetLoad { url } => Err(ParleyError::internal(format!(
                "Dataset load for {url} cannot be answered as a turn"
            ))),
        }
    }

    /// One-shot image question, always on the fast tier.
    async fn image_stream(
        service: &dyn ModelService,
        image: &Attachment,
        text: &str,
    ) -> Result<FragmentStream> {
        let turn = Turn {
            role: ServiceRole::User,
            parts: vec![
                Part::InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
                Part::Text(image_prompt(text).to_string()),
            ],
        };
        let request = GenerateRequest::new(ModelTier::Flash.model_id(), vec![turn]);
        service.generate_content_stream(request).await
    }

    async fn run_load(&mut self, source: CsvSource) {
        let name = source.display_name();
        self.add_notice(Message::system(format!(
            "Loading and parsing CSV data from {}...",
            source.describe()
        )));

        let parsed = self
            .csv_ingestor
            .parse(&source)
            .await
            .and_then(|parsed| {
                if parsed.records.is_empty() {
                    Err(ParleyError::CsvEmpty)
                } else {
                    Ok(parsed)
                }
            });

        match parsed {
            Ok(parsed) => {
                tracing::info!(
                    "[ChatUseCase] Loaded dataset {} with {} records",
                    name,
                    parsed.records.len()
                );
                self.dataset = Some(LoadedDataset::new(name.clone(), parsed));
                self.session = None;
                self.sink
                    .emit(ConversationEvent::DatasetChanged(Some(name.clone())));
                self.add_notice(Message::system(format!(
                    "Successfully loaded \"{name}\". The AI now has full context of the file. \
                     You can ask questions about its content."
                )));
            }
            Err(err) => {
                tracing::error!("[ChatUseCase] Failed to load dataset {}: {}", name, err);
                self.add_notice(
                    Message::system(format!("Failed to load CSV: {}", err.user_message()))
                        .with_error(),
                );
                self.clear_dataset();
            }
        }
    }

    fn add_message(&mut self, message: Message) -> Result<()> {
        let added = self.store.push(message)?.clone();
        self.sink.emit(ConversationEvent::MessageAdded(added));
        Ok(())
    }

    /// Records a system notice. Notices are never pending, so the store
    /// accepts them; a refusal would be logged rather than returned.
    fn add_notice(&mut self, message: Message) {
        if let Err(err) = self.add_message(message) {
            tracing::error!("[ChatUseCase] Dropped system notice: {}", err);
        }
    }

    fn clear_dataset(&mut self) {
        if self.dataset.take().is_some() {
            self.sink.emit(ConversationEvent::DatasetChanged(None));
        }
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.sink.emit(ConversationEvent::BusyChanged(busy));
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.busy {
            tracing::warn!("[ChatUseCase] Rejected request while busy");
            return Err(ParleyError::Busy);
        }
        Ok(())
    }
}
