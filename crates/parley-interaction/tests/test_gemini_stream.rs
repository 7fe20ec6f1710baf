use futures::StreamExt;
use parley_core::{ChatSession, Fragment, GenerateRequest, ModelService, ParleyError, Result, Turn};
use parley_interaction::{GeminiApiClient, GeminiChatSession};
use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_PATH: &str = "/gemini-2.5-flash:streamGenerateContent";

fn sse_body(texts: &[&str]) -> String {
    texts
        .iter()
        .map(|text| {
            format!(
                "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":{}}}]}}}}]}}\r\n\r\n",
                Value::String(text.to_string())
            )
        })
        .collect()
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> GeminiApiClient {
    GeminiApiClient::with_base_url("test-key", server.uri()).expect("Key is present")
}

async fn collect_text(client: &GeminiApiClient, request: GenerateRequest) -> Result<String> {
    let fragments: Vec<Result<Fragment>> = client
        .generate_content_stream(request)
        .await?
        .collect()
        .await;
    let mut text = String::new();
    for fragment in fragments {
        if let Some(part) = fragment?.text {
            text.push_str(&part);
        }
    }
    Ok(text)
}

#[tokio::test]
async fn test_stream_yields_fragments_in_order() {
    let server = MockServer::start().await;
    mount_stream(&server, sse_body(&["The ", "quick ", "fox"])).await;

    let request = GenerateRequest::new("gemini-2.5-flash", vec![Turn::user_text("hi")])
        .with_system_instruction("be brief")
        .with_temperature(0.0);
    let text = collect_text(&client_for(&server), request).await.unwrap();
    assert_eq!(text, "The quick fox");

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
}

#[tokio::test]
async fn test_http_error_maps_to_model_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        ))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_content_stream(GenerateRequest::new(
            "gemini-2.5-flash",
            vec![Turn::user_text("hi")],
        ))
        .await
        .err()
        .unwrap();

    assert_eq!(
        err,
        ParleyError::model_service(Some(400), "INVALID_ARGUMENT: API key not valid")
    );
}

#[tokio::test]
async fn test_chat_session_replays_history() {
    let server = MockServer::start().await;
    mount_stream(&server, sse_body(&["Hi ", "there"])).await;

    let client = client_for(&server);
    let session = client.create_chat(
        "gemini-2.5-flash",
        vec![Turn::user_text("earlier"), Turn::model_text("noted")],
    );
    assert_eq!(session.model(), "gemini-2.5-flash");

    for message in ["first", "second"] {
        let fragments: Vec<Result<Fragment>> = session
            .send_message_stream(message)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(fragments.iter().all(|f| f.is_ok()));
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let first: Value = requests[0].body_json().unwrap();
    assert_eq!(first["contents"].as_array().unwrap().len(), 3);

    let second: Value = requests[1].body_json().unwrap();
    let contents = second["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 5);
    assert_eq!(contents[2]["parts"][0]["text"], "first");
    assert_eq!(contents[3]["role"], "model");
    assert_eq!(contents[3]["parts"][0]["text"], "Hi there");
    assert_eq!(contents[4]["parts"][0]["text"], "second");
}

#[tokio::test]
async fn test_chat_session_skips_reply_without_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"candidates\":[{\"finishReason\":\"SAFETY\"}]}\r\n\r\n",
            "text/event-stream",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_stream(&server, sse_body(&["Sure"])).await;

    let session = GeminiChatSession::new(
        client_for(&server),
        "gemini-2.5-flash",
        vec![Turn::user_text("earlier"), Turn::model_text("noted")],
    );

    for message in ["first", "second"] {
        let fragments: Vec<Result<Fragment>> = session
            .send_message_stream(message)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(fragments.iter().all(|f| f.is_ok()));
    }

    let requests = server.received_requests().await.unwrap();
    let second: Value = requests[1].body_json().unwrap();
    let texts: Vec<&str> = second["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|content| content["parts"][0]["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["earlier", "noted", "second"]);

    let history: Vec<String> = session.history().iter().map(|t| t.text()).collect();
    assert_eq!(history, vec!["earlier", "noted", "second", "Sure"]);
}
