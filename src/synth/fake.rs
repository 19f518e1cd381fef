//! In-process synthesis doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::stream::{CancelToken, ScriptedSource, StreamError, StreamItem};
use crate::synth::{
    AudioChunk, AudioStream, DirectAudio, DirectSynthesizer, StreamingSynthesizer,
    SynthesisError, SynthesisRequest,
};

// ---------------------------------------------------------------------------
// FakeStreamer
// ---------------------------------------------------------------------------

/// Replays a chunk script on every `open` and records the requests.
pub struct FakeStreamer {
    reply: Result<Vec<Result<StreamItem<AudioChunk>, StreamError>>, SynthesisError>,
    cancel_after: Option<(usize, CancelToken)>,
    requests: Mutex<Vec<SynthesisRequest>>,
    pulls: Mutex<Vec<Arc<AtomicUsize>>>,
}

impl FakeStreamer {
    /// Serve `chunks`, then end the stream.
    pub fn chunks(chunks: Vec<AudioChunk>) -> Self {
        Self::script(chunks.into_iter().map(|c| Ok(StreamItem::Chunk(c))).collect())
    }

    pub fn script(items: Vec<Result<StreamItem<AudioChunk>, StreamError>>) -> Self {
        Self {
            reply: Ok(items),
            cancel_after: None,
            requests: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
        }
    }

    /// `open` itself fails.
    pub fn failing(err: SynthesisError) -> Self {
        Self {
            reply: Err(err),
            ..Self::script(Vec::new())
        }
    }

    /// Cancel `token` once the `n`-th chunk has been pulled.
    pub fn cancel_after(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.text).collect()
    }

    /// Total chunk pulls across every stream handed out.
    pub fn pulls(&self) -> usize {
        self.pulls
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl StreamingSynthesizer for FakeStreamer {
    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, SynthesisError> {
        self.requests.lock().unwrap().push(request.clone());

        let items = self.reply.clone()?;
        let mut source = ScriptedSource::script(items);
        if let Some((n, token)) = &self.cancel_after {
            source = source.cancel_after(*n, token.clone());
        }
        self.pulls.lock().unwrap().push(source.pull_counter());
        Ok(Box::new(source))
    }
}

// ---------------------------------------------------------------------------
// FakeDirect
// ---------------------------------------------------------------------------

/// Returns a canned secondary response and records the requests.
pub struct FakeDirect {
    reply: Result<DirectAudio, SynthesisError>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeDirect {
    pub fn returning(audio: DirectAudio) -> Self {
        Self {
            reply: Ok(audio),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: SynthesisError) -> Self {
        Self {
            reply: Err(err),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectSynthesizer for FakeDirect {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<DirectAudio, SynthesisError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}
