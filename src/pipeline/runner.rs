//! Pipeline orchestrator: text in, encoded audio out.
//!
//! [`SpeechPipeline`] runs one [`SpeechRequest`] through the stages:
//!
//! ```text
//! validate ─▶ check credentials
//!   └─▶ [other language] TranslationStage           [Translating]
//!         ├─ Ok(non-blank) → speak translated text
//!         └─ blank / Err   → warn, speak original text
//!   └─▶ FallbackChain (primary → secondary → tone)  [Synthesizing / Fallback]
//!   └─▶ take PCM or pass-through container          [Assembling]
//!   └─▶ WavEncoder                                  [Encoding]
//!   └─▶ Success / Degraded                          [Done]
//! any unrecoverable error                           [Failed]
//! ```
//!
//! One code path serves both the translated and the untranslated case; only
//! the text handed to synthesis differs.  Every stage releases its execution
//! context on exit, whatever the outcome.

use std::sync::Arc;

use crate::audio::{EncodeError, EncodedAudio, WavEncoder};
use crate::config::{AppConfig, PipelineConfig, SynthesisConfig, TranslationConfig};
use crate::stream::{CancelToken, ContextRegistry, StreamCollector};
use crate::synth::{
    DirectSynthesizer, FallbackChain, HttpDirectSynthesizer, HttpStreamingSynthesizer,
    StreamingSynthesizer, SynthesisError, SynthesisRequest, SynthesisStage, SynthesizedAudio,
    Tier,
};
use crate::translate::{language, ApiTranslator, TranslationError, TranslationProvider, TranslationStage};

use super::error::PipelineError;
use super::request::SpeechRequest;
use super::state::{PipelineState, StateTrace};

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Terminal value of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    /// Primary synthesis produced the audio.
    Success(EncodedAudio),
    /// A lower tier produced the audio.
    Degraded(EncodedAudio, Tier),
    Failure(PipelineError),
}

impl PipelineResult {
    pub fn audio(&self) -> Option<&EncodedAudio> {
        match self {
            Self::Success(audio) | Self::Degraded(audio, _) => Some(audio),
            Self::Failure(_) => None,
        }
    }

    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Success(_) => Some(Tier::Primary),
            Self::Degraded(_, tier) => Some(*tier),
            Self::Failure(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

/// A finished run: its result plus the states it passed through.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub result: PipelineResult,
    pub trace: StateTrace,
}

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`SpeechPipeline`] from configuration.
///
/// Backends not supplied explicitly are built from config: [`ApiTranslator`],
/// [`HttpStreamingSynthesizer`] and [`HttpDirectSynthesizer`].
///
/// ```rust,no_run
/// use text_to_voice::config::AppConfig;
/// use text_to_voice::pipeline::{PipelineBuilder, SpeechRequest};
/// use text_to_voice::stream::CancelToken;
///
/// # async fn example() {
/// let pipeline = PipelineBuilder::new(&AppConfig::default()).build();
/// let run = pipeline
///     .run(&SpeechRequest::new("Hello", "es", ""), &CancelToken::new())
///     .await;
/// println!("{:?}", run.trace.states());
/// # }
/// ```
pub struct PipelineBuilder {
    config: AppConfig,
    contexts: ContextRegistry,
    translator: Option<Arc<dyn TranslationProvider>>,
    streamer: Option<Arc<dyn StreamingSynthesizer>>,
    direct: Option<Arc<dyn DirectSynthesizer>>,
}

impl PipelineBuilder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            contexts: ContextRegistry::new(),
            translator: None,
            streamer: None,
            direct: None,
        }
    }

    /// Share an existing registry (e.g. the one the health endpoint reads).
    pub fn contexts(mut self, contexts: ContextRegistry) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn TranslationProvider>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn streamer(mut self, streamer: Arc<dyn StreamingSynthesizer>) -> Self {
        self.streamer = Some(streamer);
        self
    }

    pub fn direct(mut self, direct: Arc<dyn DirectSynthesizer>) -> Self {
        self.direct = Some(direct);
        self
    }

    pub fn build(self) -> SpeechPipeline {
        let config = self.config;
        let collector = StreamCollector::new(config.pipeline.max_stream_chunks);

        let translation = config.translation.is_active().then(|| {
            let provider = self
                .translator
                .unwrap_or_else(|| {
                    Arc::new(
                        ApiTranslator::from_config(&config.translation)
                            .max_line_bytes(config.pipeline.max_line_bytes),
                    )
                });
            TranslationStage::new(
                provider,
                &config.translation,
                self.contexts.clone(),
                collector,
            )
        });

        let streamer = self
            .streamer
            .unwrap_or_else(|| {
                Arc::new(
                    HttpStreamingSynthesizer::from_config(&config.synthesis)
                        .max_line_bytes(config.pipeline.max_line_bytes),
                )
            });
        let direct = self
            .direct
            .unwrap_or_else(|| Arc::new(HttpDirectSynthesizer::from_config(&config.fallback)));

        let primary = SynthesisStage::new(streamer, self.contexts.clone(), collector);
        let synthesis =
            FallbackChain::from_config(primary, direct, &config.fallback, self.contexts.clone());

        log::info!(
            "pipeline: translation {}, synthesis tiers {:?}",
            if translation.is_some() { "on" } else { "off" },
            synthesis.tiers()
        );

        SpeechPipeline {
            settings: config.pipeline,
            translation_config: config.translation,
            synthesis_config: config.synthesis,
            translation,
            synthesis,
            encoder: WavEncoder::new(),
            contexts: self.contexts,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechPipeline
// ---------------------------------------------------------------------------

/// The request orchestrator.  Shareable across concurrent requests; each run
/// acquires its own execution contexts.
pub struct SpeechPipeline {
    settings: PipelineConfig,
    translation_config: TranslationConfig,
    synthesis_config: SynthesisConfig,
    translation: Option<TranslationStage>,
    synthesis: FallbackChain,
    encoder: WavEncoder,
    contexts: ContextRegistry,
}

impl SpeechPipeline {
    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    /// `true` when `request` will go through the translation stage.
    pub fn translation_required(&self, request: &SpeechRequest) -> bool {
        self.translation.is_some()
            && request.targets_other_language(&self.settings.default_locale)
    }

    /// Run `request` to exactly one terminal state.
    pub async fn run(&self, request: &SpeechRequest, cancel: &CancelToken) -> PipelineRun {
        let mut trace = StateTrace::new();

        let result = match self.execute(request, cancel, &mut trace).await {
            Ok((audio, tier)) => {
                enter(&mut trace, PipelineState::Done);
                log::info!("pipeline: done ({} bytes, {tier} tier)", audio.len());
                if tier.is_degraded() {
                    PipelineResult::Degraded(audio, tier)
                } else {
                    PipelineResult::Success(audio)
                }
            }
            Err(err) => {
                log::warn!(
                    "pipeline: failed in {} ({}): {err}",
                    trace.current(),
                    err.kind()
                );
                enter(&mut trace, PipelineState::Failed);
                PipelineResult::Failure(err)
            }
        };

        PipelineRun { result, trace }
    }

    async fn execute(
        &self,
        request: &SpeechRequest,
        cancel: &CancelToken,
        trace: &mut StateTrace,
    ) -> Result<(EncodedAudio, Tier), PipelineError> {
        // ── 1. Validation and configuration ──────────────────────────────
        request.validate(self.settings.max_text_chars)?;

        let credential = self
            .synthesis_config
            .credential()
            .ok_or_else(|| PipelineError::Configuration("synthesis credential is missing".into()))?
            .to_string();

        if self.synthesis_config.sample_rate == 0 {
            return Err(PipelineError::Configuration(
                "synthesis sample rate must be positive".into(),
            ));
        }

        // ── 2. Optional translation ──────────────────────────────────────
        let text = match &self.translation {
            Some(stage) if self.translation_required(request) => {
                let key = self.translation_config.credential().ok_or_else(|| {
                    PipelineError::Configuration("translation credential is missing".into())
                })?;
                enter(trace, PipelineState::Translating);
                self.translate_or_original(stage, request, key, cancel)
                    .await?
            }
            _ => request.text.clone(),
        };

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // ── 3. Synthesis with fallback ───────────────────────────────────
        enter(trace, PipelineState::Synthesizing);

        let synthesis_request = SynthesisRequest {
            voice_id: self
                .synthesis_config
                .voice_for(&request.voice_hint)
                .to_string(),
            model_id: self.synthesis_config.model_id.clone(),
            sample_rate: self.synthesis_config.sample_rate,
            source_text: (text != request.text).then(|| request.text.clone()),
            text,
            credential,
        };

        let outcome = self
            .synthesis
            .run_observed(&synthesis_request, cancel, |tier| {
                if tier != Tier::Primary && trace.current() == PipelineState::Synthesizing {
                    enter(trace, PipelineState::Fallback);
                }
            })
            .await
            .map_err(|err| match err {
                SynthesisError::Cancelled => PipelineError::Cancelled,
                SynthesisError::EmptyAudio => PipelineError::Encoding(EncodeError::Empty),
                other => PipelineError::SynthesisFailure(other),
            })?;

        // ── 4. Assembly ──────────────────────────────────────────────────
        enter(trace, PipelineState::Assembling);
        if let SynthesizedAudio::Pcm(audio) = &outcome.audio {
            log::debug!(
                "pipeline: assembled {} samples ({:.2}s at {} Hz)",
                audio.len(),
                audio.duration_secs(),
                audio.sample_rate
            );
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // ── 5. Encoding ──────────────────────────────────────────────────
        enter(trace, PipelineState::Encoding);
        let encoded = match outcome.audio {
            SynthesizedAudio::Pcm(audio) => self.encoder.encode(&audio)?,
            SynthesizedAudio::Container(wav) => wav,
        };

        Ok((encoded, outcome.tier))
    }

    /// Translate, falling back to the original text on a blank result or a
    /// provider failure.  Only cancellation aborts the request.
    async fn translate_or_original(
        &self,
        stage: &TranslationStage,
        request: &SpeechRequest,
        credential: &str,
        cancel: &CancelToken,
    ) -> Result<String, PipelineError> {
        let target = language::display_name(&request.language_tag);

        match stage.translate(&request.text, &target, credential, cancel).await {
            Ok(outcome) if outcome.was_translated => Ok(outcome.translated_text),
            Ok(_) => {
                log::warn!("pipeline: blank translation into {target}; speaking original text");
                Ok(request.text.clone())
            }
            Err(TranslationError::Cancelled) => Err(PipelineError::Cancelled),
            Err(err) => {
                let err = PipelineError::from(err);
                log::warn!("pipeline: {err} ({}); speaking original text", err.kind());
                Ok(request.text.clone())
            }
        }
    }
}

/// Record a transition.  A refused edge is logged and otherwise ignored.
fn enter(trace: &mut StateTrace, next: PipelineState) {
    if let Err(err) = trace.advance(next) {
        log::error!("pipeline: {err}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
