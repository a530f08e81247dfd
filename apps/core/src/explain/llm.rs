use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::messages::{ChatMessage, LlmMessage};
use super::traits::LlmActor;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::retry::{retry_with_backoff, RetryPolicy};

// --- Constants ---
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);
const STREAM_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);
const MAILBOX_SIZE: usize = 32;
const MAX_ERROR_BODY_CHARS: usize = 500;

/// A handle to the LLM actor.
///
/// Cloneable front for the running actor; every call becomes a message on its mailbox.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
}

impl LlmActorHandle {
    /// Spawns the actor for the completion endpoint described by `config`.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(OpenAiClient::from_config(config))
    }

    pub fn with_client(client: OpenAiClient) -> Self {
        let (sender, receiver) = mpsc::channel(MAILBOX_SIZE);
        let actor = LlmActorRunner { receiver, client };
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        chunk_sender: mpsc::Sender<String>,
    ) -> Result<(), AppError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::Stream {
            messages,
            chunk_sender,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| AppError::Actor(e.to_string()))?;
        recv.await.map_err(|e| AppError::Actor(e.to_string()))?
    }
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    client: OpenAiClient,
}

impl LlmActorRunner {
    async fn run(mut self) {
        info!("LlmActor started (endpoint: {})", self.client.completions_url);

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }

        info!("LlmActor stopped");
    }

    /// Each stream runs in its own task so one slow answer never blocks the mailbox.
    fn handle_message(&self, msg: LlmMessage) {
        match msg {
            LlmMessage::Stream {
                messages,
                chunk_sender,
                responder,
            } => {
                let client = self.client.clone();
                tokio::spawn(async move {
                    let result = client.stream_chat(messages, chunk_sender).await;
                    if let Err(e) = &result {
                        error!("Completion stream failed: {}", e);
                    }
                    let _ = responder.send(result);
                });
            }
        }
    }
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    completions_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            http: Client::new(),
            completions_url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::new(config.retry_attempts, config.retry_base),
        }
    }

    fn build_request(&self, payload: &Value) -> reqwest::RequestBuilder {
        let request = self.http.post(&self.completions_url).json(payload);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Sends the request until the endpoint accepts it. Only this step is retried: once
    /// bytes have been forwarded a retry would duplicate them.
    async fn connect(&self, payload: &Value) -> Result<Response, AppError> {
        retry_with_backoff(self.retry, || async {
            let res = timeout(COMPLETION_TIMEOUT, self.build_request(payload).send()).await??;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(AppError::Upstream {
                    status: status.as_u16(),
                    message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                });
            }
            Ok(res)
        })
        .await
    }

    pub async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        chunk_sender: mpsc::Sender<String>,
    ) -> Result<(), AppError> {
        debug!("Streaming completion with {} messages", messages.len());

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": true
        });

        let res = self.connect(&payload).await?;
        let mut stream = res.bytes_stream();
        let mut parser = SseParser::default();

        loop {
            let next = timeout(STREAM_CHUNK_TIMEOUT, stream.next()).await.map_err(|_| {
                AppError::Timeout(format!(
                    "no data from the completion endpoint for {}s",
                    STREAM_CHUNK_TIMEOUT.as_secs()
                ))
            })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            for event in parser.push(&chunk) {
                if !forward_event(event, &chunk_sender).await? {
                    return Ok(());
                }
            }
        }

        // A last line without its trailing newline
        if let Some(event) = parser.finish() {
            forward_event(event, &chunk_sender).await?;
        }

        Ok(())
    }
}

/// Returns `Ok(false)` when the stream is over: `[DONE]` or a dropped receiver.
async fn forward_event(event: SseEvent, chunk_sender: &mpsc::Sender<String>) -> Result<bool, AppError> {
    let data = match event {
        SseEvent::Done => return Ok(false),
        SseEvent::Data(data) => data,
    };

    let response: StreamResponse = match serde_json::from_str(&data) {
        Ok(response) => response,
        Err(e) => {
            warn!("Skipping unparseable stream event: {}", e);
            return Ok(true);
        }
    };

    if let Some(err) = response.error {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(AppError::Upstream { status: 502, message });
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    if let Some(content) = content {
        if chunk_sender.send(content).await.is_err() {
            debug!("Chunk receiver dropped, ending stream");
            return Ok(false);
        }
    }
    Ok(true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Incremental parser for `data:` lines of a server-sent event stream.
///
/// Bytes are buffered until a full line is available, so events and multi-byte characters
/// split across network chunks come out whole.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Parses whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    Some(SseEvent::Data(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_url: &str) -> AppConfig {
        AppConfig {
            api_key: Some("sk-test".to_string()),
            api_base: format!("{}/v1", server_url),
            retry_attempts: 2,
            retry_base: Duration::from_millis(1),
            ..AppConfig::default()
        }
    }

    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::new();
        for delta in deltas {
            let event = json!({"choices": [{"delta": {"content": delta}}]});
            body.push_str(&format!("data: {}\n\n", event));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn collect(handle: &LlmActorHandle) -> (Result<(), AppError>, String) {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![ChatMessage::user("Explain closures")];
        let result = handle.stream(messages, tx).await;
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            text.push_str(&chunk);
        }
        (result, text)
    }

    #[test]
    fn test_sse_parser_handles_split_lines() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"data: {\"a\"").is_empty());
        let events = parser.push(b":1}\r\n\r\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn test_sse_parser_keeps_multibyte_chars_whole() {
        let mut parser = SseParser::default();
        let line = "data: héllo\n".as_bytes();
        // Split inside the two-byte 'é'
        assert!(parser.push(&line[..8]).is_empty());
        let events = parser.push(&line[8..]);
        assert_eq!(events, vec![SseEvent::Data("héllo".to_string())]);
    }

    #[test]
    fn test_sse_parser_ignores_comments_and_flushes_tail() {
        let mut parser = SseParser::default();
        assert!(parser.push(b": keep-alive\n\n").is_empty());
        assert!(parser.push(b"data: tail").is_empty());
        assert_eq!(parser.finish(), Some(SseEvent::Data("tail".to_string())));
        assert_eq!(parser.finish(), None);
    }

    #[tokio::test]
    async fn test_stream_forwards_deltas() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&["A closure ", "captures ", "scope."]), "text/event-stream"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let handle = LlmActorHandle::new(&test_config(&mock_server.uri()));
        let (result, text) = collect(&handle).await;

        assert!(result.is_ok());
        assert_eq!(text, "A closure captures scope.");
    }

    #[tokio::test]
    async fn test_stream_retries_server_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"))
            .mount(&mock_server)
            .await;

        let handle = LlmActorHandle::new(&test_config(&mock_server.uri()));
        let (result, text) = collect(&handle).await;

        assert!(result.is_ok());
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_stream_client_error_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let handle = LlmActorHandle::new(&test_config(&mock_server.uri()));
        let (result, text) = collect(&handle).await;

        match result {
            Err(AppError::Upstream { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid api key"));
            }
            other => panic!("Expected AppError::Upstream, got {:?}", other),
        }
        assert!(text.is_empty());
    }
}
