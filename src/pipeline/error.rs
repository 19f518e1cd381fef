//! Pipeline-boundary error taxonomy.
//!
//! Stage errors never leave the pipeline raw; the orchestrator converts each
//! into one of the [`PipelineError`] kinds below.

use thiserror::Error;

use crate::audio::EncodeError;
use crate::synth::SynthesisError;
use crate::translate::TranslationError;

/// Coarse error class, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    TranslationFailure,
    SynthesisFailure,
    Encoding,
    Cancelled,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::TranslationFailure => "translation_failure",
            Self::SynthesisFailure => "synthesis_failure",
            Self::Encoding => "encoding",
            Self::Cancelled => "cancelled",
        }
    }

    /// `true` for failures caused by the caller's input or the deployment,
    /// reported as 4xx-style errors.
    pub fn is_client_facing(&self) -> bool {
        matches!(self, Self::Validation | Self::Configuration)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that can end a pipeline run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Empty or oversized text.  Raised before any remote call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing credential or unusable setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Translation failed.  Absorbed by the orchestrator, never returned
    /// from a run.
    #[error("translation failed: {0}")]
    TranslationFailure(#[from] TranslationError),

    /// Every synthesis tier failed.
    #[error("synthesis failed: {0}")]
    SynthesisFailure(#[from] SynthesisError),

    /// The assembled audio could not be turned into a container.
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodeError),

    /// The caller went away.
    #[error("request cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::TranslationFailure(_) => ErrorKind::TranslationFailure,
            Self::SynthesisFailure(_) => ErrorKind::SynthesisFailure,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(
            PipelineError::Validation("empty".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            PipelineError::from(SynthesisError::Timeout).kind(),
            ErrorKind::SynthesisFailure
        );
        assert_eq!(
            PipelineError::from(EncodeError::Empty).kind(),
            ErrorKind::Encoding
        );
        assert_eq!(PipelineError::Cancelled.kind().label(), "cancelled");
    }

    #[test]
    fn only_validation_and_configuration_are_client_facing() {
        assert!(ErrorKind::Validation.is_client_facing());
        assert!(ErrorKind::Configuration.is_client_facing());
        assert!(!ErrorKind::Encoding.is_client_facing());
        assert!(!ErrorKind::Cancelled.is_client_facing());
    }

    #[test]
    fn display_carries_cause() {
        let err = PipelineError::Configuration("synthesis credential missing".into());
        assert_eq!(
            err.to_string(),
            "configuration error: synthesis credential missing"
        );
    }
}
