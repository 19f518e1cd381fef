//! Audio assembly and encoding: float samples → RIFF/WAVE bytes.
//!
//! # Pipeline
//!
//! ```text
//! AudioChunk.samples (f32, arrival order) → AssembledAudio
//!           → WavEncoder (clamp + quantise to i16 LE) → EncodedAudio ("audio/wav")
//!
//! ToneGenerator (last-resort fallback) → AssembledAudio
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use text_to_voice::audio::{AssembledAudio, WavEncoder};
//!
//! let audio = AssembledAudio::new(24_000, vec![0.0; 240]);
//! let encoded = WavEncoder::new().encode(&audio).unwrap();
//! assert_eq!(encoded.len(), 44 + 480);
//! assert_eq!(encoded.mime_type(), "audio/wav");
//! ```

pub mod assembled;
pub mod tone;
pub mod wav;

pub use assembled::AssembledAudio;
pub use tone::ToneGenerator;
pub use wav::{quantize, EncodeError, EncodedAudio, WavEncoder, WavHeader, WAV_HEADER_LEN, WAV_MIME_TYPE};
