//! Secondary synthesis: one synchronous request, one complete audio payload.
//!
//! The HTTP backend posts `{text, voiceId, modelId}` and expects
//! `{audioContent, audioEncoding?, usage?}` where `audioContent` is base64.
//! `audioEncoding` says what the payload is (`"wav"` or `"pcm_f32le"`); when
//! absent, the configured [`PayloadFormat`] applies.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;

use crate::audio::{AssembledAudio, EncodedAudio};
use crate::config::{FallbackConfig, PayloadFormat};
use crate::synth::provider::{status_error, SynthesisError, SynthesisRequest};
use crate::synth::SynthesizedAudio;

// ---------------------------------------------------------------------------
// DirectAudio
// ---------------------------------------------------------------------------

/// A decoded secondary response: raw payload bytes plus the format tag the
/// provider declared, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectAudio {
    pub payload: Vec<u8>,
    pub format: Option<PayloadFormat>,
}

impl DirectAudio {
    /// Turn the payload into audio.
    ///
    /// * `Wav`: must be a RIFF/WAVE container; passed through unmodified.
    /// * `PcmF32le`: little-endian `f32` mono samples at `sample_rate`.
    pub fn into_audio(
        self,
        default_format: PayloadFormat,
        sample_rate: u32,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        if self.payload.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        match self.format.unwrap_or(default_format) {
            PayloadFormat::Wav => EncodedAudio::from_container(self.payload)
                .map(SynthesizedAudio::Container)
                .map_err(|e| SynthesisError::Decode(e.to_string())),
            PayloadFormat::PcmF32le => {
                decode_f32le(&self.payload, sample_rate).map(SynthesizedAudio::Pcm)
            }
        }
    }
}

/// Decode little-endian `f32` samples.
pub fn decode_f32le(bytes: &[u8], sample_rate: u32) -> Result<AssembledAudio, SynthesisError> {
    if bytes.len() % 4 != 0 {
        return Err(SynthesisError::Decode(format!(
            "pcm_f32le payload of {} bytes is not a whole number of samples",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(AssembledAudio::new(sample_rate, samples))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectResponse {
    audio_content: Option<String>,
    audio_encoding: Option<String>,
    usage: Option<serde_json::Value>,
}

/// Parse a secondary response body.  A missing `audioContent` is an error.
pub fn parse_direct_response(body: &str) -> Result<DirectAudio, SynthesisError> {
    let response: DirectResponse =
        serde_json::from_str(body).map_err(|e| SynthesisError::Malformed(e.to_string()))?;

    let content = response
        .audio_content
        .ok_or_else(|| SynthesisError::Malformed("response has no audioContent".into()))?;

    let format = match response.audio_encoding.as_deref() {
        None => None,
        Some(tag) => Some(PayloadFormat::from_tag(tag).ok_or_else(|| {
            SynthesisError::Decode(format!("unsupported audioEncoding {tag:?}"))
        })?),
    };

    if let Some(usage) = response.usage {
        log::debug!("secondary synthesis usage: {usage}");
    }

    let payload = general_purpose::STANDARD
        .decode(content.trim())
        .map_err(|e| SynthesisError::Decode(e.to_string()))?;

    Ok(DirectAudio { payload, format })
}

// ---------------------------------------------------------------------------
// DirectSynthesizer trait
// ---------------------------------------------------------------------------

/// A non-streaming synthesis backend.
#[async_trait]
pub trait DirectSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<DirectAudio, SynthesisError>;
}

// ---------------------------------------------------------------------------
// HttpDirectSynthesizer
// ---------------------------------------------------------------------------

/// JSON-over-HTTP secondary synthesis backend.
pub struct HttpDirectSynthesizer {
    client: reqwest::Client,
    url: String,
}

impl HttpDirectSynthesizer {
    pub fn from_config(config: &FallbackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.direct_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.direct_url.clone(),
        }
    }
}

#[async_trait]
impl DirectSynthesizer for HttpDirectSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<DirectAudio, SynthesisError> {
        let body = serde_json::json!({
            "text":    request.text,
            "voiceId": request.voice_id,
            "modelId": request.model_id,
        });

        let mut req = self.client.post(&self.url).json(&body);
        if !request.credential.is_empty() {
            req = req.bearer_auth(&request.credential);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await?;
        parse_direct_response(&text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{WavEncoder, WavHeader};

    fn b64(bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    fn f32le(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn parses_tagged_payload() {
        let body = format!(
            r#"{{"audioContent":"{}","audioEncoding":"pcm_f32le","usage":{{"characters":5}}}}"#,
            b64(&f32le(&[0.5, -0.5]))
        );
        let direct = parse_direct_response(&body).unwrap();
        assert_eq!(direct.format, Some(PayloadFormat::PcmF32le));
        assert_eq!(direct.payload.len(), 8);
    }

    #[test]
    fn missing_audio_content_is_malformed() {
        let err = parse_direct_response(r#"{"usage":{}}"#).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::Malformed("response has no audioContent".into())
        );
    }

    #[test]
    fn unknown_encoding_tag_is_decode_error() {
        let body = format!(r#"{{"audioContent":"{}","audioEncoding":"mp3"}}"#, b64(b"x"));
        assert!(matches!(
            parse_direct_response(&body),
            Err(SynthesisError::Decode(_))
        ));
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        assert!(matches!(
            parse_direct_response(r#"{"audioContent":"***"}"#),
            Err(SynthesisError::Decode(_))
        ));
    }

    #[test]
    fn pcm_payload_becomes_assembled_audio() {
        let direct = DirectAudio {
            payload: f32le(&[0.25, -1.0, 0.0]),
            format: Some(PayloadFormat::PcmF32le),
        };
        match direct.into_audio(PayloadFormat::Wav, 22_050).unwrap() {
            SynthesizedAudio::Pcm(audio) => {
                assert_eq!(audio.sample_rate, 22_050);
                assert_eq!(audio.samples, vec![0.25, -1.0, 0.0]);
            }
            other => panic!("expected PCM, got {other:?}"),
        }
    }

    #[test]
    fn wav_payload_passes_through_unmodified() {
        let encoded = WavEncoder::new()
            .encode(&AssembledAudio::new(8_000, vec![0.1; 80]))
            .unwrap();
        let bytes = encoded.bytes().to_vec();

        let direct = DirectAudio {
            payload: bytes.clone(),
            format: None,
        };
        match direct.into_audio(PayloadFormat::Wav, 24_000).unwrap() {
            SynthesizedAudio::Container(wav) => {
                assert_eq!(wav.bytes(), bytes.as_slice());
                assert_eq!(WavHeader::parse(wav.bytes()).unwrap().sample_rate, 8_000);
            }
            other => panic!("expected container, got {other:?}"),
        }
    }

    #[test]
    fn default_format_applies_when_untagged() {
        let direct = DirectAudio {
            payload: f32le(&[0.1]),
            format: None,
        };
        assert!(matches!(
            direct.into_audio(PayloadFormat::PcmF32le, 8_000),
            Ok(SynthesizedAudio::Pcm(_))
        ));
    }

    #[test]
    fn non_wav_bytes_tagged_wav_are_rejected() {
        let direct = DirectAudio {
            payload: b"ID3\x03not a wave file".to_vec(),
            format: Some(PayloadFormat::Wav),
        };
        assert!(matches!(
            direct.into_audio(PayloadFormat::Wav, 8_000),
            Err(SynthesisError::Decode(_))
        ));
    }

    #[test]
    fn magic_only_container_is_rejected() {
        let direct = DirectAudio {
            payload: b"RIFF\0\0\0\0WAVE".to_vec(),
            format: Some(PayloadFormat::Wav),
        };
        assert!(matches!(
            direct.into_audio(PayloadFormat::Wav, 8_000),
            Err(SynthesisError::Decode(_))
        ));
    }

    #[test]
    fn ragged_pcm_is_rejected() {
        assert!(matches!(
            decode_f32le(&[0, 0, 0], 8_000),
            Err(SynthesisError::Decode(_))
        ));
    }

    #[test]
    fn empty_payload_is_empty_audio() {
        let direct = DirectAudio {
            payload: Vec::new(),
            format: None,
        };
        assert_eq!(
            direct.into_audio(PayloadFormat::Wav, 8_000).unwrap_err(),
            SynthesisError::EmptyAudio
        );
    }
}
