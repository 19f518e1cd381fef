//! Inbound [`SpeechRequest`] and its validation.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;
use crate::translate::language;

/// One call to the speech pipeline.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub text: String,
    /// Target language; blank means the default locale.
    #[serde(default)]
    pub language_tag: String,
    /// Named voice from configuration; blank means the default voice.
    #[serde(default)]
    pub voice_hint: String,
}

impl SpeechRequest {
    pub fn new(
        text: impl Into<String>,
        language_tag: impl Into<String>,
        voice_hint: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            language_tag: language_tag.into(),
            voice_hint: voice_hint.into(),
        }
    }

    /// Reject blank text and text longer than `max_chars` characters.
    pub fn validate(&self, max_chars: usize) -> Result<(), PipelineError> {
        if self.text.trim().is_empty() {
            return Err(PipelineError::Validation("text must not be empty".into()));
        }

        let chars = self.text.chars().count();
        if chars > max_chars {
            return Err(PipelineError::Validation(format!(
                "text is {chars} characters, limit is {max_chars}"
            )));
        }

        Ok(())
    }

    /// `true` when the target language differs from `default_locale`'s
    /// language family.
    pub fn targets_other_language(&self, default_locale: &str) -> bool {
        !self.language_tag.trim().is_empty()
            && !language::same_family(&self.language_tag, default_locale)
    }
}
