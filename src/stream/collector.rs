//! [`ChunkSource`] contract and the [`StreamCollector`] that drains it.

use async_trait::async_trait;
use thiserror::Error;

use crate::stream::CancelToken;

// ---------------------------------------------------------------------------
// StreamError
// ---------------------------------------------------------------------------

/// Failures while pulling chunks from a streamed response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    /// The underlying connection failed mid-stream.
    #[error("stream transport failed: {0}")]
    Transport(String),

    /// No response arrived within the configured timeout.
    #[error("stream timed out")]
    Timeout,

    /// A chunk could not be decoded or lacks a required field.
    #[error("malformed chunk: {0}")]
    Malformed(String),

    /// The provider kept sending past the configured chunk limit.
    #[error("stream exceeded the limit of {limit} chunks")]
    TooManyChunks { limit: usize },

    /// The enclosing request was cancelled.
    #[error("stream cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StreamError::Timeout
        } else {
            StreamError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Result of one "request next" call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    Chunk(T),
    /// The sequence is exhausted.  Sources keep returning `Done` afterwards.
    Done,
}

/// A lazy, forward-only sequence of chunks.
///
/// Each call suspends until the provider delivers the next chunk.  A source
/// cannot be rewound; restarting means issuing a new remote call.
#[async_trait]
pub trait ChunkSource: Send {
    type Chunk: Send;

    async fn next_chunk(&mut self) -> Result<StreamItem<Self::Chunk>, StreamError>;
}

/// Folds chunks into an accumulated result.
pub trait Accumulator<T> {
    /// Consume one chunk.  Returns `Ok(true)` when the chunk carried the
    /// provider's completion flag.
    fn accept(&mut self, chunk: T) -> Result<bool, StreamError>;
}

// ---------------------------------------------------------------------------
// StreamCollector
// ---------------------------------------------------------------------------

/// Drains a [`ChunkSource`] into an [`Accumulator`], strictly one chunk at a
/// time and in arrival order.
#[derive(Debug, Clone, Copy)]
pub struct StreamCollector {
    max_chunks: usize,
}

impl StreamCollector {
    /// `max_chunks` bounds runaway streams; `0` is treated as `1`.
    pub fn new(max_chunks: usize) -> Self {
        Self {
            max_chunks: max_chunks.max(1),
        }
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Pull chunks until the source reports `Done` or a chunk carries the
    /// completion flag.  Returns the number of chunks consumed.
    ///
    /// Cancellation is checked before every pull and raced against the
    /// pending pull; once observed, no further pulls are issued and
    /// [`StreamError::Cancelled`] is returned.  Whatever `acc` holds at that
    /// point must be discarded by the caller.
    pub async fn drain<S, A>(
        &self,
        source: &mut S,
        acc: &mut A,
        cancel: &CancelToken,
    ) -> Result<usize, StreamError>
    where
        S: ChunkSource + ?Sized,
        A: Accumulator<S::Chunk> + Send,
    {
        let mut received = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }

            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                item = source.next_chunk() => item?,
            };

            let chunk = match item {
                StreamItem::Done => return Ok(received),
                StreamItem::Chunk(chunk) => chunk,
            };

            received += 1;
            if received > self.max_chunks {
                return Err(StreamError::TooManyChunks {
                    limit: self.max_chunks,
                });
            }

            if acc.accept(chunk)? {
                return Ok(received);
            }
        }
    }
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new(10_000)
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a fixed script of pull results, then `Done`.
///
/// `pulls()` reports how many times `next_chunk` was called, so tests can
/// verify that nothing is prefetched and that cancellation stops the pulls.
#[cfg(test)]
pub struct ScriptedSource<T> {
    script: std::collections::VecDeque<Result<StreamItem<T>, StreamError>>,
    pulls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    cancel_after: Option<(usize, CancelToken)>,
}

#[cfg(test)]
impl<T: Send> ScriptedSource<T> {
    /// Replay `chunks` as successful pulls.
    pub fn chunks(chunks: impl IntoIterator<Item = T>) -> Self {
        Self::script(chunks.into_iter().map(|c| Ok(StreamItem::Chunk(c))))
    }

    /// Replay an arbitrary script of results.
    pub fn script(items: impl IntoIterator<Item = Result<StreamItem<T>, StreamError>>) -> Self {
        Self {
            script: items.into_iter().collect(),
            pulls: Default::default(),
            cancel_after: None,
        }
    }

    /// Cancel `token` right after the `n`-th pull is served.
    pub fn cancel_after(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    /// Shared pull counter that outlives the source.
    pub fn pull_counter(&self) -> std::sync::Arc<std::sync::atomic::AtomicUsize> {
        std::sync::Arc::clone(&self.pulls)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl<T: Send> ChunkSource for ScriptedSource<T> {
    type Chunk = T;

    async fn next_chunk(&mut self) -> Result<StreamItem<T>, StreamError> {
        let n = self.pulls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let item = self.script.pop_front().unwrap_or(Ok(StreamItem::Done));
        if let Some((after, token)) = &self.cancel_after {
            if n >= *after {
                token.cancel();
            }
        }
        item
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
