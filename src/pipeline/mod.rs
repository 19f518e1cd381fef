//! Request orchestration for the text-to-voice service.
//!
//! This module turns a [`SpeechRequest`] into encoded audio: optional
//! translation, synthesis with tiered fallback, assembly and WAV encoding.
//! It also holds the error taxonomy callers see and the shared result cache.
//!
//! # Architecture
//!
//! ```text
//! SpeechRequest
//!        │
//!        ▼
//! SpeechPipeline::run()            ← one async call per request
//!        │
//!        ├─ validate / credentials               Init
//!        ├─ TranslationStage::translate          Translating   (other language only)
//!        ├─ FallbackChain::run_observed          Synthesizing → Fallback
//!        ├─ SynthesizedAudio → PCM or container  Assembling
//!        └─ WavEncoder::encode                   Encoding → Done
//!
//! PipelineRun { result: PipelineResult, trace: StateTrace }
//! AudioCache (Arc, shared by request handlers) ← stores finished audio
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use text_to_voice::config::AppConfig;
//! use text_to_voice::pipeline::{AudioCache, PipelineBuilder, PipelineResult, SpeechRequest};
//! use text_to_voice::stream::CancelToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = AppConfig::default();
//!     config.apply_env_overrides();
//!
//!     let pipeline = PipelineBuilder::new(&config).build();
//!     let cache = AudioCache::from_config(&config.cache);
//!
//!     let request = SpeechRequest::new("Good morning", "fr", "");
//!     let run = pipeline.run(&request, &CancelToken::new()).await;
//!
//!     if let Some(audio) = run.result.audio() {
//!         let id = cache.insert(audio.clone());
//!         println!("stored {id}");
//!     }
//!     if let PipelineResult::Failure(err) = run.result {
//!         eprintln!("{} error: {err}", err.kind());
//!     }
//! }
//! ```

pub mod cache;
pub mod error;
pub mod request;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cache::AudioCache;
pub use error::{ErrorKind, PipelineError};
pub use request::SpeechRequest;
pub use runner::{PipelineBuilder, PipelineResult, PipelineRun, SpeechPipeline};
pub use state::{InvalidTransition, PipelineState, StateTrace};
