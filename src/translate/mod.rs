//! Optional translation step ahead of synthesis.
//!
//! This module provides:
//! * [`TranslationProvider`]: async trait for remote translation backends.
//! * [`ApiTranslator`]: OpenAI-compatible chat-completions backend, streamed
//!   (SSE) or complete responses.
//! * [`TranslationStage`]: builds the prompt, issues one call, drains the
//!   answer and returns a [`TranslationOutcome`].
//! * [`PromptBuilder`]: two-message translation prompt.
//! * [`language`]: primary-subtag comparison and display names.

pub mod language;
pub mod prompt;
pub mod provider;
pub mod stage;

#[cfg(test)]
mod fake;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use prompt::PromptBuilder;
pub use provider::{
    parse_completion, parse_sse_line, ApiTranslator, ChatMessage, DeltaStream, SseDeltaSource,
    SseLine, TranslationDelta, TranslationError, TranslationProvider, TranslationRequest,
    TranslationResponse,
};
pub use stage::{TranslationOutcome, TranslationStage};

#[cfg(test)]
pub use fake::FakeTranslator;
