//! Streaming synthesis: [`StreamingSynthesizer`] trait and its HTTP backend.
//!
//! The HTTP backend posts `{voiceId, modelId, sampleRate, text}` to
//! `{base_url}/v1/tts/stream` and reads newline-delimited JSON chunks:
//!
//! ```text
//! {"text":"Hel","audio":{"data":[0.0,0.01,...]},"done":false}
//! {"text":"lo","audio":{"data":[...]},"done":false}
//! {"text":"","done":true}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SynthesisConfig;
use crate::stream::{
    failure_body, ChunkSource, HttpLineReader, StreamError, StreamItem, DEFAULT_MAX_LINE_BYTES,
};

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

/// Errors raised by any synthesis tier.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("synthesis request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A chunk or response lacks a required field.
    #[error("malformed synthesis response: {0}")]
    Malformed(String),

    /// The chunk stream failed part-way.
    #[error("synthesis stream failed: {0}")]
    Stream(StreamError),

    /// An audio payload could not be decoded.
    #[error("failed to decode audio payload: {0}")]
    Decode(String),

    /// The tier finished but produced no samples.
    #[error("synthesis produced no audio")]
    EmptyAudio,

    #[error("synthesis cancelled")]
    Cancelled,
}

impl SynthesisError {
    /// Short stable name used when logging tier transitions.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Timeout => "timeout",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::Stream(_) => "stream",
            Self::Decode(_) => "decode",
            Self::EmptyAudio => "empty_audio",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout
        } else {
            SynthesisError::Request(e.to_string())
        }
    }
}

impl From<StreamError> for SynthesisError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Timeout => SynthesisError::Timeout,
            StreamError::Cancelled => SynthesisError::Cancelled,
            StreamError::Malformed(msg) => SynthesisError::Malformed(msg),
            other => SynthesisError::Stream(other),
        }
    }
}

/// Read a non-success response into a [`SynthesisError::Status`].
pub(crate) async fn status_error(response: reqwest::Response) -> SynthesisError {
    let (status, body) = failure_body(response).await;
    SynthesisError::Status { status, body }
}

// ---------------------------------------------------------------------------
// Request / chunk shapes
// ---------------------------------------------------------------------------

/// One synthesis call.  The credential travels as a bearer token, never in
/// the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub voice_id: String,
    pub model_id: String,
    pub sample_rate: u32,
    pub text: String,
    #[serde(skip)]
    pub credential: String,
    /// Caller's text before translation, when `text` is a translation.
    #[serde(skip)]
    pub source_text: Option<String>,
}

impl SynthesisRequest {
    /// Text whose length sizes the placeholder tone: the caller's input,
    /// whatever language `text` ended up in.
    pub fn input_text(&self) -> &str {
        self.source_text.as_deref().unwrap_or(&self.text)
    }
}

/// One element of a streamed synthesis response.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub text_fragment: String,
    pub samples: Option<Vec<f32>>,
    pub is_final: bool,
}

impl AudioChunk {
    pub fn new(text_fragment: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            text_fragment: text_fragment.into(),
            samples: Some(samples),
            is_final: false,
        }
    }

    /// Terminal chunk without audio.
    pub fn final_marker() -> Self {
        Self {
            text_fragment: String::new(),
            samples: None,
            is_final: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    text: String,
    audio: Option<WireAudio>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAudio {
    data: Vec<f32>,
}

/// Decode one NDJSON line.  Blank lines yield `Ok(None)`.
pub fn parse_audio_chunk(line: &str) -> Result<Option<AudioChunk>, StreamError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let wire: WireChunk =
        serde_json::from_str(line).map_err(|e| StreamError::Malformed(e.to_string()))?;

    if let Some(message) = wire.error {
        return Err(StreamError::Transport(message));
    }

    Ok(Some(AudioChunk {
        text_fragment: wire.text,
        samples: wire.audio.map(|a| a.data),
        is_final: wire.done,
    }))
}

/// Lazy, finite, non-rewindable sequence of audio chunks.
pub type AudioStream = Box<dyn ChunkSource<Chunk = AudioChunk>>;

// ---------------------------------------------------------------------------
// StreamingSynthesizer trait
// ---------------------------------------------------------------------------

/// A remote synthesis backend that answers with a chunk stream.
#[async_trait]
pub trait StreamingSynthesizer: Send + Sync {
    /// Issue the remote call and hand back the unread chunk stream.
    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, SynthesisError>;
}

// ---------------------------------------------------------------------------
// HttpStreamingSynthesizer
// ---------------------------------------------------------------------------

/// NDJSON-over-HTTP streaming synthesis backend.
pub struct HttpStreamingSynthesizer {
    client: reqwest::Client,
    base_url: String,
    max_line_bytes: usize,
}

impl HttpStreamingSynthesizer {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Longest NDJSON line accepted from the chunk stream.
    pub fn max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/tts/stream", self.base_url)
    }
}

#[async_trait]
impl StreamingSynthesizer for HttpStreamingSynthesizer {
    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, SynthesisError> {
        let mut req = self.client.post(self.endpoint()).json(request);
        if !request.credential.is_empty() {
            req = req.bearer_auth(&request.credential);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(Box::new(NdjsonAudioSource::new(HttpLineReader::with_limit(
            response,
            self.max_line_bytes,
        ))))
    }
}

/// Pulls [`AudioChunk`]s from an NDJSON response body.
pub struct NdjsonAudioSource {
    lines: HttpLineReader,
    finished: bool,
}

impl NdjsonAudioSource {
    pub fn new(lines: HttpLineReader) -> Self {
        Self {
            lines,
            finished: false,
        }
    }
}

#[async_trait]
impl ChunkSource for NdjsonAudioSource {
    type Chunk = AudioChunk;

    async fn next_chunk(&mut self) -> Result<StreamItem<AudioChunk>, StreamError> {
        while !self.finished {
            let Some(line) = self.lines.next_line().await? else {
                self.finished = true;
                break;
            };

            if let Some(chunk) = parse_audio_chunk(&line)? {
                self.finished = chunk.is_final;
                return Ok(StreamItem::Chunk(chunk));
            }
        }
        Ok(StreamItem::Done)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ndjson_response(body: &str) -> reqwest::Response {
        let response = axum::http::Response::builder()
            .header("content-type", "application/x-ndjson")
            .body(body.to_string())
            .unwrap();
        reqwest::Response::from(response)
    }

    #[test]
    fn request_body_uses_camel_case_and_omits_credential() {
        let request = SynthesisRequest {
            voice_id: "nova".into(),
            model_id: "tts-streaming-1".into(),
            sample_rate: 24_000,
            text: "Hello".into(),
            credential: "secret".into(),
            source_text: Some("Hallo".into()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["voiceId"], "nova");
        assert_eq!(json["modelId"], "tts-streaming-1");
        assert_eq!(json["sampleRate"], 24_000);
        assert_eq!(json["text"], "Hello");
        assert!(json.get("credential").is_none());
        assert!(json.get("sourceText").is_none());
        assert_eq!(request.input_text(), "Hallo");
    }

    #[test]
    fn parses_chunk_with_samples() {
        let chunk = parse_audio_chunk(r#"{"text":"Hel","audio":{"data":[0.5,-0.25]},"done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk, AudioChunk::new("Hel", vec![0.5, -0.25]));
    }

    #[test]
    fn done_chunk_may_omit_audio() {
        let chunk = parse_audio_chunk(r#"{"done":true}"#).unwrap().unwrap();
        assert_eq!(chunk, AudioChunk::final_marker());
    }

    #[test]
    fn chunk_without_audio_parses_with_none_samples() {
        let chunk = parse_audio_chunk(r#"{"text":"x","done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.samples, None);
        assert!(!chunk.is_final);
    }

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(parse_audio_chunk("   ").unwrap(), None);
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_audio_chunk("{\"text\":"),
            Err(StreamError::Malformed(_))
        ));
    }

    #[test]
    fn error_field_is_transport_failure() {
        assert_eq!(
            parse_audio_chunk(r#"{"error":"voice not found"}"#),
            Err(StreamError::Transport("voice not found".into()))
        );
    }

    #[test]
    fn error_classes_are_stable() {
        assert_eq!(SynthesisError::Timeout.class(), "timeout");
        assert_eq!(SynthesisError::Malformed("x".into()).class(), "malformed");
        assert_eq!(
            SynthesisError::Status {
                status: 503,
                body: String::new()
            }
            .class(),
            "status"
        );
    }

    #[test]
    fn stream_errors_map_to_synthesis_errors() {
        assert_eq!(
            SynthesisError::from(StreamError::Malformed("no audio".into())),
            SynthesisError::Malformed("no audio".into())
        );
        assert_eq!(
            SynthesisError::from(StreamError::Cancelled),
            SynthesisError::Cancelled
        );
        assert_eq!(
            SynthesisError::from(StreamError::TooManyChunks { limit: 3 }),
            SynthesisError::Stream(StreamError::TooManyChunks { limit: 3 })
        );
    }

    #[test]
    fn synthesizer_is_object_safe() {
        let _: Box<dyn StreamingSynthesizer> =
            Box::new(HttpStreamingSynthesizer::from_config(&SynthesisConfig::default()));
    }

    #[tokio::test]
    async fn ndjson_source_reads_until_done_chunk() {
        let body = "\
{\"text\":\"Hel\",\"audio\":{\"data\":[0.1,0.2]},\"done\":false}\n\
\n\
{\"text\":\"lo\",\"audio\":{\"data\":[0.3]},\"done\":false}\n\
{\"text\":\"\",\"done\":true}\n\
{\"text\":\"after\",\"audio\":{\"data\":[0.9]},\"done\":false}\n";
        let mut source = NdjsonAudioSource::new(HttpLineReader::new(ndjson_response(body)));

        let mut chunks = Vec::new();
        while let StreamItem::Chunk(chunk) = source.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text_fragment, "Hel");
        assert_eq!(chunks[1].samples, Some(vec![0.3]));
        assert!(chunks[2].is_final);
    }

    #[tokio::test]
    async fn oversized_ndjson_line_is_malformed() {
        let body = format!("{{\"text\":\"{}\"", "a".repeat(256));
        let mut source = NdjsonAudioSource::new(HttpLineReader::with_limit(ndjson_response(&body), 64));
        assert!(matches!(
            source.next_chunk().await,
            Err(StreamError::Malformed(_))
        ));
    }
}
