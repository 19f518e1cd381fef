//! Pull-based consumption of streamed provider responses.
//!
//! Every streamed response (translation deltas or synthesis audio chunks)
//! is exposed as a [`ChunkSource`]: an explicit "request next" call that
//! yields either a chunk or [`StreamItem::Done`].  [`StreamCollector`] drives
//! a source to completion, one awaited call at a time, folding each chunk
//! into an [`Accumulator`].
//!
//! ```text
//! HTTP body ──chunk()──▶ LineBuffer ──line──▶ ChunkSource::next_chunk()
//!                                                │
//!                       StreamCollector::drain ◀─┘  (checks CancelToken
//!                                │                   before every call)
//!                                ▼
//!                          Accumulator::accept
//! ```

pub mod cancel;
pub mod collector;
pub mod context;
pub mod lines;

pub use cancel::CancelToken;
pub use collector::{Accumulator, ChunkSource, StreamCollector, StreamError, StreamItem};
pub use context::{ContextRegistry, ContextStats, ExecutionContext};
pub use lines::{failure_body, HttpLineReader, LineBuffer, DEFAULT_MAX_LINE_BYTES, MAX_ERROR_BODY_CHARS};

#[cfg(test)]
pub use collector::ScriptedSource;
