//! [`SynthesisStage`]: drain a streamed synthesis response into one buffer.

use std::sync::Arc;

use crate::audio::AssembledAudio;
use crate::stream::{
    Accumulator, CancelToken, ContextRegistry, ExecutionContext, StreamCollector, StreamError,
};
use crate::synth::provider::{
    AudioChunk, AudioStream, StreamingSynthesizer, SynthesisError, SynthesisRequest,
};

// ---------------------------------------------------------------------------
// AudioAccumulator
// ---------------------------------------------------------------------------

/// Appends chunk samples in arrival order and keeps a diagnostic transcript.
///
/// The sample rate is fixed at construction from configuration; chunk
/// count never influences it.
#[derive(Debug)]
struct AudioAccumulator {
    transcript: String,
    audio: AssembledAudio,
    chunks: usize,
}

impl AudioAccumulator {
    fn new(sample_rate: u32) -> Self {
        Self {
            transcript: String::new(),
            audio: AssembledAudio::empty(sample_rate),
            chunks: 0,
        }
    }
}

impl Accumulator<AudioChunk> for AudioAccumulator {
    fn accept(&mut self, chunk: AudioChunk) -> Result<bool, StreamError> {
        self.chunks += 1;
        self.transcript.push_str(&chunk.text_fragment);

        match chunk.samples {
            Some(samples) => self.audio.append(&samples),
            None if chunk.is_final => {}
            None => {
                return Err(StreamError::Malformed(format!(
                    "chunk {} carries no audio samples",
                    self.chunks
                )))
            }
        }

        Ok(chunk.is_final)
    }
}

// ---------------------------------------------------------------------------
// SynthesisStage
// ---------------------------------------------------------------------------

/// Primary synthesis through a [`StreamingSynthesizer`].
pub struct SynthesisStage {
    synthesizer: Arc<dyn StreamingSynthesizer>,
    contexts: ContextRegistry,
    collector: StreamCollector,
}

impl SynthesisStage {
    pub fn new(
        synthesizer: Arc<dyn StreamingSynthesizer>,
        contexts: ContextRegistry,
        collector: StreamCollector,
    ) -> Self {
        Self {
            synthesizer,
            contexts,
            collector,
        }
    }

    /// Synthesize `request.text`, draining the chunk stream to completion.
    ///
    /// The returned audio carries `request.sample_rate`.  A partially drained
    /// stream is never returned: any failure or cancellation discards what
    /// was collected so far.
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<AssembledAudio, SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }

        let mut ctx: ExecutionContext<AudioStream> = self.contexts.acquire("synthesis");
        ctx.note("voice_id", request.voice_id.as_str());

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
            stream = self.synthesizer.open(request) => stream?,
        };
        let stream = ctx.attach(stream);

        let mut acc = AudioAccumulator::new(request.sample_rate);
        let chunks = self.collector.drain(&mut **stream, &mut acc, cancel).await?;

        log::debug!(
            "context {}: {chunks} chunks, {} samples, transcript {:?}",
            ctx.id(),
            acc.audio.len(),
            acc.transcript
        );
        ctx.note("transcript", acc.transcript);

        Ok(acc.audio)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamItem;
    use crate::synth::FakeStreamer;

    fn request(text: &str, sample_rate: u32) -> SynthesisRequest {
        SynthesisRequest {
            voice_id: "default".into(),
            model_id: "tts-streaming-1".into(),
            sample_rate,
            text: text.into(),
            credential: "k".into(),
            source_text: None,
        }
    }

    fn stage(synth: Arc<FakeStreamer>, registry: &ContextRegistry) -> SynthesisStage {
        SynthesisStage::new(synth, registry.clone(), StreamCollector::default())
    }

    #[tokio::test]
    async fn samples_concatenate_in_chunk_order() {
        let synth = Arc::new(FakeStreamer::chunks(vec![
            AudioChunk::new("He", vec![0.1, 0.2]),
            AudioChunk::new("llo", vec![0.3]),
            AudioChunk::new("", vec![0.4, 0.5]),
            AudioChunk::final_marker(),
        ]));
        let registry = ContextRegistry::new();

        let audio = stage(synth.clone(), &registry)
            .synthesize(&request("Hello", 24_000), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(audio.samples, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(synth.texts(), vec!["Hello".to_string()]);
    }

    #[tokio::test]
    async fn sample_rate_comes_from_request() {
        let synth = Arc::new(FakeStreamer::chunks(vec![
            AudioChunk::new("a", vec![0.0; 10]),
            AudioChunk::final_marker(),
        ]));
        let registry = ContextRegistry::new();

        let audio = stage(synth, &registry)
            .synthesize(&request("a", 16_000), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.len(), 10);
    }

    #[tokio::test]
    async fn final_chunk_samples_are_kept() {
        let synth = Arc::new(FakeStreamer::chunks(vec![
            AudioChunk::new("a", vec![0.1]),
            AudioChunk {
                text_fragment: "b".into(),
                samples: Some(vec![0.2]),
                is_final: true,
            },
        ]));
        let registry = ContextRegistry::new();

        let audio = stage(synth, &registry)
            .synthesize(&request("ab", 8_000), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(audio.samples, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn chunk_without_samples_is_malformed() {
        let synth = Arc::new(FakeStreamer::chunks(vec![
            AudioChunk::new("a", vec![0.1]),
            AudioChunk {
                text_fragment: "b".into(),
                samples: None,
                is_final: false,
            },
        ]));
        let registry = ContextRegistry::new();

        let err = stage(synth, &registry)
            .synthesize(&request("ab", 8_000), &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SynthesisError::Malformed("chunk 2 carries no audio samples".into())
        );
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn open_failure_propagates() {
        let synth = Arc::new(FakeStreamer::failing(SynthesisError::Status {
            status: 503,
            body: "busy".into(),
        }));
        let registry = ContextRegistry::new();

        let err = stage(synth, &registry)
            .synthesize(&request("a", 8_000), &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.class(), "status");
        assert_eq!(registry.stats().released, 1);
    }

    #[tokio::test]
    async fn mid_stream_error_discards_partial_audio() {
        let synth = Arc::new(FakeStreamer::script(vec![
            Ok(StreamItem::Chunk(AudioChunk::new("a", vec![0.1]))),
            Err(StreamError::Transport("reset".into())),
        ]));
        let registry = ContextRegistry::new();

        let err = stage(synth, &registry)
            .synthesize(&request("a", 8_000), &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SynthesisError::Stream(StreamError::Transport("reset".into()))
        );
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_pulling() {
        let token = CancelToken::new();
        let synth = Arc::new(
            FakeStreamer::chunks(vec![
                AudioChunk::new("a", vec![0.1]),
                AudioChunk::new("b", vec![0.2]),
                AudioChunk::new("c", vec![0.3]),
                AudioChunk::final_marker(),
            ])
            .cancel_after(1, token.clone()),
        );
        let registry = ContextRegistry::new();

        let err = stage(synth.clone(), &registry)
            .synthesize(&request("abc", 8_000), &token)
            .await
            .unwrap_err();

        assert_eq!(err, SynthesisError::Cancelled);
        assert_eq!(synth.pulls(), 1);
        assert_eq!(registry.live(), 0);
    }

    #[tokio::test]
    async fn end_of_stream_without_final_marker_completes() {
        let synth = Arc::new(FakeStreamer::chunks(vec![AudioChunk::new("a", vec![0.5])]));
        let registry = ContextRegistry::new();

        let audio = stage(synth, &registry)
            .synthesize(&request("a", 8_000), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(audio.samples, vec![0.5]);
    }
}
