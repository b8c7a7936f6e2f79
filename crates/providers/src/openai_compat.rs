//! OpenAI-compatible streaming provider.
//!
//! Works with any endpoint exposing `/chat/completions` with SSE streaming.
//! The default target is Volcengine Ark, whose reasoning models stream a
//! `reasoning_content` delta alongside the regular `content` delta and
//! accept a `thinking` switch in the request body.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use policybot_core::error::ProviderError;
use policybot_core::message::Message;
use policybot_core::provider::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Volcengine Ark's OpenAI-compatible base URL.
pub const ARK_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider whose whole-request timeout is `timeout`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an Ark provider (convenience constructor).
    pub fn ark(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::new("ark", ARK_BASE_URL, api_key, timeout)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": true,
            "thinking": { "type": request.thinking.as_str() },
        })
    }
}

/// What one SSE line means for the stream.
#[derive(Debug, PartialEq)]
enum SseLine {
    /// Blank line, comment, or a payload we do not understand
    Skip,
    /// A delta to forward
    Chunk(StreamChunk),
    /// Terminal `[DONE]` marker
    Done,
    /// An error object sent in place of a delta
    Error(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => {
            if let Some(error) = resp.error {
                return SseLine::Error(error.describe());
            }
            let Some(choice) = resp.choices.into_iter().next() else {
                return SseLine::Skip;
            };
            let delta = choice.delta;
            if delta.reasoning_content.is_none() && delta.content.is_none() {
                return SseLine::Skip;
            }
            SseLine::Chunk(StreamChunk {
                reasoning: delta.reasoning_content,
                content: delta.content,
                done: false,
            })
        }
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            SseLine::Skip
        }
    }
}

#[async_trait]
impl policybot_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            thinking = request.thinking.as_str(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited);
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward parsed deltas
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            // Bytes, not text: a multi-byte character may span two chunks
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(provider = %provider_name, error = %e, "SSE stream interrupted");
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw[..line_end]);

                    if !forward(parse_sse_line(&line), &tx, &provider_name).await {
                        return;
                    }
                }
            }

            // Trailing line without a newline
            let trailing = parse_sse_line(&String::from_utf8_lossy(&buffer));
            if !forward(trailing, &tx, &provider_name).await {
                return;
            }

            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

/// Send what `line` carries. Returns false once the stream has ended or
/// the receiver is gone.
async fn forward(
    line: SseLine,
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    provider_name: &str,
) -> bool {
    match line {
        SseLine::Skip => true,
        SseLine::Chunk(chunk) => tx.send(Ok(chunk)).await.is_ok(),
        SseLine::Done => {
            let _ = tx.send(Ok(StreamChunk::done())).await;
            false
        }
        SseLine::Error(message) => {
            warn!(
                provider = %provider_name,
                error = %message,
                "Provider reported an error mid-stream"
            );
            let _ = tx.send(Err(ProviderError::StreamInterrupted(message))).await;
            false
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

/// `{"error": {"code": .., "message": ..}}` frame.
#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

impl StreamError {
    fn describe(&self) -> String {
        match &self.code {
            Some(serde_json::Value::String(code)) => format!("{code}: {}", self.message),
            Some(serde_json::Value::Null) | None => self.message.clone(),
            Some(code) => format!("{code}: {}", self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use policybot_core::Provider;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", server.uri(), "ark-test", Duration::from_secs(5))
            .unwrap()
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "ep-test".into(),
            messages: vec![Message::system("你是助手"), Message::user("你好")],
            thinking: ThinkingMode::Auto,
        }
    }

    async fn collect(mut rx: ChunkReceiver) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(item) = rx.recv().await {
            chunks.push(item.unwrap());
        }
        chunks
    }

    #[test]
    fn ark_constructor() {
        let provider = OpenAiCompatProvider::ark("ark-test", Duration::from_secs(1800)).unwrap();
        assert_eq!(provider.name(), "ark");
        assert!(provider.base_url.contains("volces.com"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider =
            OpenAiCompatProvider::new("x", "http://localhost/v3/", "k", Duration::from_secs(1))
                .unwrap();
        assert_eq!(provider.base_url, "http://localhost/v3");
    }

    #[test]
    fn request_body_carries_thinking_flag() {
        let body = OpenAiCompatProvider::request_body(&request());
        assert_eq!(body["stream"], true);
        assert_eq!(body["thinking"]["type"], "auto");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "你好");
    }

    #[test]
    fn parse_reasoning_delta() {
        let line = r#"data: {"choices":[{"delta":{"reasoning_content":"想","content":""}}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.reasoning.as_deref(), Some("想"));
                assert_eq!(chunk.content.as_deref(), Some(""));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"答"}}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert!(chunk.reasoning.is_none());
                assert_eq!(chunk.content.as_deref(), Some("答"));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_control_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: not-json"), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line(r#"data: {"choices":[]}"#), SseLine::Skip);
    }

    #[test]
    fn parse_error_frame() {
        let line = r#"data: {"error":{"code":"QuotaExceeded","message":"quota exceeded"}}"#;
        assert_eq!(
            parse_sse_line(line),
            SseLine::Error("QuotaExceeded: quota exceeded".into())
        );
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"overloaded"}}"#),
            SseLine::Error("overloaded".into())
        );
    }

    #[tokio::test]
    async fn error_frame_ends_stream_with_error() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"部分\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"不会到达\"}}]}\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let mut rx = provider_for(&server).stream(request()).await.unwrap();
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("部分"));

        match rx.recv().await {
            Some(Err(ProviderError::StreamInterrupted(message))) => {
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected stream error, got {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn streams_reasoning_then_answer() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"先想\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"答案\"}}]}\n\n",
            "data: [DONE]\n\n"
        );

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer ark-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "ep-test",
                "stream": true,
                "thinking": {"type": "auto"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let rx = provider_for(&server).stream(request()).await.unwrap();
        let chunks = collect(rx).await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].reasoning.as_deref(), Some("先想"));
        assert_eq!(chunks[1].content.as_deref(), Some("答案"));
        assert!(chunks[2].done);
    }

    #[tokio::test]
    async fn stream_without_done_marker_still_terminates() {
        let server = MockServer::start().await;
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}";

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let rx = provider_for(&server).stream(request()).await.unwrap();
        let chunks = collect(rx).await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.as_deref(), Some("hi"));
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer ark-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(provider_for(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn health_check_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(!provider_for(&server).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider_for(&server).stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn server_error_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("endpoint overloaded"))
            .mount(&server)
            .await;

        match provider_for(&server).stream(request()).await.unwrap_err() {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "endpoint overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let provider = OpenAiCompatProvider::new(
            "down",
            "http://127.0.0.1:9",
            "k",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = provider.stream(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
