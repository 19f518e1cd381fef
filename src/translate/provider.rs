//! [`TranslationProvider`] trait and the OpenAI-compatible [`ApiTranslator`].
//!
//! `ApiTranslator` calls any `/v1/chat/completions` endpoint (OpenAI, Groq,
//! Ollama in OpenAI mode, vLLM and similar).  A request may be answered with
//! a single JSON body or with a server-sent event stream of deltas; both
//! come back as a [`TranslationResponse`].

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::TranslationConfig;
use crate::stream::{
    failure_body, ChunkSource, HttpLineReader, StreamError, StreamItem, DEFAULT_MAX_LINE_BYTES,
};

// ---------------------------------------------------------------------------
// TranslationError
// ---------------------------------------------------------------------------

/// Errors that can occur during translation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TranslationError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("translation request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse translation response: {0}")]
    Parse(String),

    /// The delta stream failed part-way.
    #[error("translation stream failed: {0}")]
    Stream(StreamError),

    #[error("translation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TranslationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslationError::Timeout
        } else {
            TranslationError::Request(e.to_string())
        }
    }
}

impl From<StreamError> for TranslationError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Timeout => TranslationError::Timeout,
            StreamError::Cancelled => TranslationError::Cancelled,
            other => TranslationError::Stream(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// One remote translation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub provider: String,
    pub model: String,
    pub credential: String,
    pub streaming: bool,
    pub messages: Vec<ChatMessage>,
}

/// One streamed text delta.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationDelta {
    pub text: String,
    pub done: bool,
}

impl TranslationDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

/// Lazy, finite, non-rewindable sequence of deltas.
pub type DeltaStream = Box<dyn ChunkSource<Chunk = TranslationDelta>>;

/// The two response shapes a provider may produce.
pub enum TranslationResponse {
    Complete(String),
    Streamed(DeltaStream),
}

impl std::fmt::Debug for TranslationResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// TranslationProvider trait
// ---------------------------------------------------------------------------

/// A remote translation backend.
///
/// Implementors must be `Send + Sync` so they can be shared across requests
/// as `Arc<dyn TranslationProvider>`.  Each `send` is exactly one remote call.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn send(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslationError>;
}

// ---------------------------------------------------------------------------
// ApiTranslator
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ApiTranslator {
    client: reqwest::Client,
    base_url: String,
    temperature: f32,
    max_line_bytes: usize,
}

impl ApiTranslator {
    /// Build from application config.  The client timeout covers the whole
    /// call, streamed body included.
    pub fn from_config(config: &TranslationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Longest SSE line accepted from a streamed answer.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl TranslationProvider for ApiTranslator {
    /// The `Authorization: Bearer …` header is attached only for a non-empty
    /// credential, so local providers without auth keep working.
    async fn send(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResponse, TranslationError> {
        let body = serde_json::json!({
            "model":       request.model,
            "messages":    request.messages,
            "stream":      request.streaming,
            "temperature": self.temperature,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if !request.credential.is_empty() {
            req = req.bearer_auth(&request.credential);
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let (status, body) = failure_body(response).await;
            return Err(TranslationError::Status { status, body });
        }

        // Some providers ignore `stream: true` and answer with plain JSON.
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if request.streaming && !is_json {
            let source = SseDeltaSource::new(HttpLineReader::with_limit(response, self.max_line_bytes));
            return Ok(TranslationResponse::Streamed(Box::new(source)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranslationError::Parse(e.to_string()))?;

        parse_completion(&json).map(TranslationResponse::Complete)
    }
}

/// Extract `choices[0].message.content` from a non-streamed completion.
///
/// An empty string is a valid answer here; deciding what a blank
/// translation means is up to the caller.
pub fn parse_completion(json: &serde_json::Value) -> Result<String, TranslationError> {
    if let Some(message) = json["error"]["message"].as_str() {
        return Err(TranslationError::Request(message.to_string()));
    }

    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| TranslationError::Parse("missing choices[0].message.content".into()))
}

// ---------------------------------------------------------------------------
// Server-sent events
// ---------------------------------------------------------------------------

/// Meaning of one SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Blank line, comment, or a non-`data` field.
    Skip,
    Delta(TranslationDelta),
    /// The `data: [DONE]` terminator.
    Done,
}

/// Classify one line of a chat-completions event stream.
pub fn parse_sse_line(line: &str) -> Result<SseLine, StreamError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };

    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let json: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| StreamError::Malformed(e.to_string()))?;

    if let Some(message) = json["error"]["message"].as_str() {
        return Err(StreamError::Transport(message.to_string()));
    }

    let choice = &json["choices"][0];
    if choice.is_null() {
        // Usage-only trailer events carry no choices.
        return Ok(SseLine::Skip);
    }

    Ok(SseLine::Delta(TranslationDelta {
        text: choice["delta"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        done: !choice["finish_reason"].is_null(),
    }))
}

/// Pulls [`TranslationDelta`]s out of a streamed HTTP response.
pub struct SseDeltaSource {
    lines: HttpLineReader,
    finished: bool,
}

impl SseDeltaSource {
    pub fn new(lines: HttpLineReader) -> Self {
        Self {
            lines,
            finished: false,
        }
    }
}

#[async_trait]
impl ChunkSource for SseDeltaSource {
    type Chunk = TranslationDelta;

    async fn next_chunk(&mut self) -> Result<StreamItem<TranslationDelta>, StreamError> {
        while !self.finished {
            let Some(line) = self.lines.next_line().await? else {
                self.finished = true;
                break;
            };

            match parse_sse_line(&line)? {
                SseLine::Skip => continue,
                SseLine::Done => self.finished = true,
                SseLine::Delta(delta) => {
                    self.finished = delta.done;
                    return Ok(StreamItem::Chunk(delta));
                }
            }
        }
        Ok(StreamItem::Done)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
