//! GeminiApiClient - Direct REST API implementation for Gemini.
//!
//! Calls `streamGenerateContent` with `alt=sse` and yields one fragment per
//! server-sent event. The API key travels in the `x-goog-api-key` header so
//! it never appears in request URLs or transport errors.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::StreamExt;
use parley_core::config::DEFAULT_API_BASE_URL;
use parley_core::secret::SecretService;
use parley_core::{
    ChatSession, Fragment, FragmentStream, GenerateRequest, ModelService, ModelServiceFactory,
    ParleyError, Result, ServiceRole, Turn,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::sse::fragment_stream;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Model client that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiApiClient {
    /// Creates a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// `ParleyError::MissingCredential` when `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_BASE_URL)
    }

    /// Creates a client for a custom endpoint (proxies, tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(missing_credential());
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn stream(&self, request: &GenerateRequest) -> Result<FragmentStream> {
        let url = format!(
            "{}/{model}:streamGenerateContent?alt=sse",
            self.base_url,
            model = request.model
        );
        let body = GenerateContentRequest::from(request);

        tracing::debug!(
            model = %request.model,
            turns = body.contents.len(),
            "[Gemini] streamGenerateContent"
        );

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                ParleyError::model_service(None, format!("Gemini API request failed: {err}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        Ok(fragment_stream(response.bytes_stream(), parse_event))
    }
}

#[async_trait]
impl ModelService for GeminiApiClient {
    async fn generate_content_stream(&self, request: GenerateRequest) -> Result<FragmentStream> {
        self.stream(&request).await
    }

    fn create_chat(&self, model: &str, history: Vec<Turn>) -> Box<dyn ChatSession> {
        Box::new(GeminiChatSession::new(self.clone(), model, history))
    }
}

/// Stateful chat held client-side: every send replays the accumulated turns.
///
/// A user/model pair is appended to the history only after its reply stream
/// completes with text; a failed or empty exchange leaves the history untouched.
pub struct GeminiChatSession {
    client: GeminiApiClient,
    model: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl GeminiChatSession {
    pub fn new(client: GeminiApiClient, model: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            client,
            model: model.into(),
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// Snapshot of the turns the session would replay.
    pub fn history(&self) -> Vec<Turn> {
        lock_history(&self.history).clone()
    }
}

fn lock_history(history: &Mutex<Vec<Turn>>) -> MutexGuard<'_, Vec<Turn>> {
    history.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("[Gemini] Chat history lock was poisoned; recovering");
        poisoned.into_inner()
    })
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    fn model(&self) -> &str {
        &self.model
    }

    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream> {
        let user_turn = Turn::user_text(text);
        let mut contents = self.history();
        contents.push(user_turn.clone());

        let request = GenerateRequest::new(self.model.clone(), contents);
        let mut inner = self.client.stream(&request).await?;
        let history = Arc::clone(&self.history);

        Ok(Box::pin(async_stream::stream! {
            let mut reply = String::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(fragment) => {
                        if let Some(text) = &fragment.text {
                            reply.push_str(text);
                        }
                        yield Ok::<Fragment, ParleyError>(fragment);
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            // Gemini rejects empty text parts, so a reply without text
            // (safety block, bare finishReason) is not recorded.
            if reply.is_empty() {
                tracing::warn!("[Gemini] Reply had no text; exchange left out of chat history");
            } else {
                let mut history = lock_history(&history);
                history.push(user_turn);
                history.push(Turn::model_text(reply));
            }
        }))
    }
}

/// Builds a [`GeminiApiClient`] per turn from the ambient credential.
pub struct GeminiServiceFactory {
    secret_service: Arc<dyn SecretService>,
    base_url: String,
}

impl GeminiServiceFactory {
    pub fn new(secret_service: Arc<dyn SecretService>, base_url: impl Into<String>) -> Self {
        Self {
            secret_service,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ModelServiceFactory for GeminiServiceFactory {
    async fn create(&self) -> Result<Arc<dyn ModelService>> {
        let api_key = self
            .secret_service
            .gemini_api_key()
            .await?
            .ok_or_else(missing_credential)?;
        Ok(Arc::new(GeminiApiClient::with_base_url(
            api_key,
            self.base_url.clone(),
        )?))
    }
}

fn missing_credential() -> ParleyError {
    ParleyError::MissingCredential(
        "Gemini API key is not set. Export GEMINI_API_KEY or add it to ~/.config/parley/secret.json"
            .to_string(),
    )
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl From<&GenerateRequest> for GenerateContentRequest {
    fn from(request: &GenerateRequest) -> Self {
        Self {
            contents: request.contents.iter().map(Content::from).collect(),
            system_instruction: request.system_instruction.as_ref().map(|text| {
                SystemInstruction {
                    parts: vec![Part::Text { text: text.clone() }],
                }
            }),
            generation_config: request
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        }
    }
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        Self {
            role: match turn.role {
                ServiceRole::User => "user",
                ServiceRole::Model => "model",
            },
            parts: turn.parts.iter().map(Part::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

impl From<&parley_core::Part> for Part {
    fn from(part: &parley_core::Part) -> Self {
        match part {
            parley_core::Part::Text(text) => Part::Text { text: text.clone() },
            parley_core::Part::InlineData { mime_type, data } => Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: mime_type.clone(),
                    data: BASE64_STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

impl ErrorBody {
    fn describe(self, fallback: &str) -> String {
        let status_text = self.status.unwrap_or_default();
        let msg = self.message.unwrap_or_else(|| fallback.to_string());
        if status_text.is_empty() {
            msg
        } else {
            format!("{status_text}: {msg}")
        }
    }
}

/// Maps one SSE payload to a fragment; in-stream errors end the stream.
fn parse_event(data: &str) -> Result<Fragment> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|err| {
        ParleyError::StreamInterrupted(format!("Failed to parse Gemini stream event: {err}"))
    })?;

    if let Some(error) = event.error {
        let status = error.code;
        return Err(ParleyError::model_service(status, error.describe(data)));
    }

    let text: Option<String> = event
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        });
    Ok(Fragment { text })
}

fn map_http_error(status: StatusCode, body: String) -> ParleyError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| wrapper.error.describe(&body))
        .unwrap_or_else(|_| body.clone());
    ParleyError::model_service(Some(status.as_u16()), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_missing_credential() {
        let err = GeminiApiClient::new("   ").err().unwrap();
        assert!(matches!(err, ParleyError::MissingCredential(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest::new(
            "gemini-2.5-flash",
            vec![
                Turn::model_text("Hello"),
                Turn {
                    role: ServiceRole::User,
                    parts: vec![
                        parley_core::Part::InlineData {
                            mime_type: "image/png".to_string(),
                            data: vec![0, 1, 2],
                        },
                        parley_core::Part::Text("Describe this image.".to_string()),
                    ],
                },
            ],
        )
        .with_system_instruction("rules")
        .with_temperature(0.0);

        let json = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();
        assert_eq!(json["contents"][0]["role"], "model");
        assert_eq!(json["contents"][1]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][1]["parts"][0]["inlineData"]["data"], "AAEC");
        assert_eq!(json["contents"][1]["parts"][1]["text"], "Describe this image.");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "rules");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_request_body_omits_unset_options() {
        let request = GenerateRequest::new("gemini-2.5-pro", vec![Turn::user_text("hi")]);
        let json = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_parse_event_joins_parts() {
        let fragment = parse_event(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(fragment, Fragment::text("Hello"));
    }

    #[test]
    fn test_parse_event_without_text() {
        let fragment = parse_event(r#"{"candidates":[{"finishReason":"STOP"}]}"#).unwrap();
        assert_eq!(fragment.text, None);
    }

    #[test]
    fn test_parse_event_error_payload() {
        let err = parse_event(
            r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParleyError::model_service(Some(503), "UNAVAILABLE: overloaded")
        );
    }

    #[test]
    fn test_map_http_error_plain_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "bad gateway".to_string());
        assert_eq!(err, ParleyError::model_service(Some(502), "bad gateway"));
    }

    #[test]
    fn test_poisoned_history_is_recovered() {
        let history = Arc::new(Mutex::new(vec![Turn::user_text("kept")]));
        let poisoner = Arc::clone(&history);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(history.is_poisoned());

        lock_history(&history).push(Turn::model_text("after"));

        assert_eq!(
            *lock_history(&history),
            vec![Turn::user_text("kept"), Turn::model_text("after")]
        );
    }
}
