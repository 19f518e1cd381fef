//! Speech synthesis with tiered fallback.
//!
//! This module provides:
//! * [`StreamingSynthesizer`]: primary backend returning a chunk stream,
//!   with [`HttpStreamingSynthesizer`] speaking NDJSON over HTTP.
//! * [`SynthesisStage`]: drains that stream into one [`AssembledAudio`].
//! * [`DirectSynthesizer`]: secondary backend returning one payload, with
//!   [`HttpDirectSynthesizer`] decoding base64 `audioContent`.
//! * [`FallbackChain`]: primary, secondary and tone tiers in strict order.
//!
//! [`AssembledAudio`]: crate::audio::AssembledAudio

pub mod direct;
pub mod fallback;
pub mod provider;
pub mod stage;

#[cfg(test)]
mod fake;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use direct::{
    decode_f32le, parse_direct_response, DirectAudio, DirectSynthesizer, HttpDirectSynthesizer,
};
pub use fallback::{
    FallbackChain, FallbackOutcome, PrimaryTier, SecondaryTier, SynthesisTier, SynthesizedAudio,
    Tier, ToneTier,
};
pub use provider::{
    parse_audio_chunk, AudioChunk, AudioStream, HttpStreamingSynthesizer, NdjsonAudioSource,
    StreamingSynthesizer, SynthesisError, SynthesisRequest,
};
pub use stage::SynthesisStage;

#[cfg(test)]
pub use fake::{FakeDirect, FakeStreamer};
