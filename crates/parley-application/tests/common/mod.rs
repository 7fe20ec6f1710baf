#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use parley_core::{
    ChatSession, CsvIngestor, CsvSource, Fragment, FragmentStream, GenerateRequest, ModelService,
    ModelServiceFactory, ParleyError, ParsedCsv, Result, Turn,
};

/// Scripted behaviour of one model call.
#[derive(Clone)]
pub enum Reply {
    /// Streams the fragments, then ends.
    Fragments(Vec<&'static str>),
    /// Streams the fragments, then fails.
    FailAfter(Vec<&'static str>, ParleyError),
    /// Fails before any stream is established.
    Refuse(ParleyError),
}

impl Reply {
    fn into_stream(self) -> Result<FragmentStream> {
        let (texts, tail) = match self {
            Reply::Fragments(texts) => (texts, None),
            Reply::FailAfter(texts, err) => (texts, Some(err)),
            Reply::Refuse(err) => return Err(err),
        };
        let mut items: Vec<Result<Fragment>> =
            texts.into_iter().map(|t| Ok(Fragment::text(t))).collect();
        if let Some(err) = tail {
            items.push(Err(err));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// One chat session created by the fake service.
#[derive(Debug, Clone)]
pub struct CreatedChat {
    pub model: String,
    pub history: Vec<Turn>,
    pub sent: Arc<Mutex<Vec<String>>>,
}

#[derive(Default)]
struct Recorder {
    replies: VecDeque<Reply>,
    requests: Vec<GenerateRequest>,
    chats: Vec<CreatedChat>,
}

impl Recorder {
    fn next_reply(&mut self) -> Reply {
        self.replies
            .pop_front()
            .unwrap_or_else(|| Reply::Fragments(vec!["ok"]))
    }
}

/// Fake model service recording stateless requests and created chats.
#[derive(Clone, Default)]
pub struct FakeModelService {
    inner: Arc<Mutex<Recorder>>,
}

impl FakeModelService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, reply: Reply) {
        self.inner.lock().unwrap().replies.push_back(reply);
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn chats(&self) -> Vec<CreatedChat> {
        self.inner.lock().unwrap().chats.clone()
    }
}

#[async_trait]
impl ModelService for FakeModelService {
    async fn generate_content_stream(&self, request: GenerateRequest) -> Result<FragmentStream> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request);
        inner.next_reply().into_stream()
    }

    fn create_chat(&self, model: &str, history: Vec<Turn>) -> Box<dyn ChatSession> {
        let sent = Arc::new(Mutex::new(Vec::new()));
        self.inner.lock().unwrap().chats.push(CreatedChat {
            model: model.to_string(),
            history,
            sent: sent.clone(),
        });
        Box::new(FakeChatSession {
            model: model.to_string(),
            sent,
            service: self.clone(),
        })
    }
}

struct FakeChatSession {
    model: String,
    sent: Arc<Mutex<Vec<String>>>,
    service: FakeModelService,
}

#[async_trait]
impl ChatSession for FakeChatSession {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream> {
        self.sent.lock().unwrap().push(text.to_string());
        let reply = self.service.inner.lock().unwrap().next_reply();
        reply.into_stream()
    }
}

/// Factory that hands out the shared fake, or fails like a missing key.
pub struct FakeFactory {
    service: Option<FakeModelService>,
}

impl FakeFactory {
    pub fn with(service: &FakeModelService) -> Arc<Self> {
        Arc::new(Self {
            service: Some(service.clone()),
        })
    }

    pub fn without_key() -> Arc<Self> {
        Arc::new(Self { service: None })
    }
}

#[async_trait]
impl ModelServiceFactory for FakeFactory {
    async fn create(&self) -> Result<Arc<dyn ModelService>> {
        match &self.service {
            Some(service) => Ok(Arc::new(service.clone())),
            None => Err(ParleyError::MissingCredential(
                "Gemini API key not found".to_string(),
            )),
        }
    }
}

/// CSV ingestor answering from a fixed table of sources.
#[derive(Default)]
pub struct FakeIngestor {
    results: HashMap<String, Result<ParsedCsv>>,
}

impl FakeIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &CsvSource, result: Result<ParsedCsv>) -> Self {
        self.results.insert(source.describe(), result);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl CsvIngestor for FakeIngestor {
    async fn parse(&self, source: &CsvSource) -> Result<ParsedCsv> {
        self.results
            .get(&source.describe())
            .cloned()
            .unwrap_or(Err(ParleyError::csv_fetch(404)))
    }
}
