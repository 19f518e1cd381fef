//! Three-tier synthesis fallback.
//!
//! Tiers run in strict order, each only when the previous one failed:
//!
//! 1. **Primary**: streamed synthesis through [`SynthesisStage`].
//! 2. **Secondary**: one non-streaming call to a simpler endpoint.
//! 3. **Tertiary**: a deterministic sine tone that cannot fail.
//!
//! Each tier is attempted at most once per request.  Every transition is
//! logged at `warn` with the triggering error class.  Cancellation stops the
//! chain immediately instead of moving on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::{AssembledAudio, EncodedAudio, ToneGenerator};
use crate::config::{FallbackConfig, PayloadFormat};
use crate::stream::{CancelToken, ContextRegistry, ExecutionContext};
use crate::synth::direct::DirectSynthesizer;
use crate::synth::provider::{SynthesisError, SynthesisRequest};
use crate::synth::stage::SynthesisStage;

// ---------------------------------------------------------------------------
// Tier / SynthesizedAudio
// ---------------------------------------------------------------------------

/// Which fallback tier produced the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Primary,
    Secondary,
    Tertiary,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        }
    }

    /// Anything but the primary tier is degraded quality.
    pub fn is_degraded(&self) -> bool {
        *self != Self::Primary
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Audio as a tier hands it back: raw samples still to be encoded, or a
/// finished container from a provider that returns complete files.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizedAudio {
    Pcm(AssembledAudio),
    Container(EncodedAudio),
}

impl SynthesizedAudio {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Pcm(audio) => audio.is_empty(),
            Self::Container(wav) => wav.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisTier trait
// ---------------------------------------------------------------------------

/// One rung of the fallback ladder.
#[async_trait]
pub trait SynthesisTier: Send + Sync {
    fn tier(&self) -> Tier;

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

/// Primary tier: the streaming stage.
pub struct PrimaryTier {
    stage: SynthesisStage,
}

impl PrimaryTier {
    pub fn new(stage: SynthesisStage) -> Self {
        Self { stage }
    }
}

#[async_trait]
impl SynthesisTier for PrimaryTier {
    fn tier(&self) -> Tier {
        Tier::Primary
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.stage
            .synthesize(request, cancel)
            .await
            .map(SynthesizedAudio::Pcm)
    }
}

/// Secondary tier: a single request/response call.
pub struct SecondaryTier {
    synthesizer: Arc<dyn DirectSynthesizer>,
    contexts: ContextRegistry,
    model_id: String,
    default_format: PayloadFormat,
}

impl SecondaryTier {
    pub fn new(
        synthesizer: Arc<dyn DirectSynthesizer>,
        config: &FallbackConfig,
        contexts: ContextRegistry,
    ) -> Self {
        Self {
            synthesizer,
            contexts,
            model_id: config.direct_model_id.clone(),
            default_format: config.direct_payload_format,
        }
    }
}

#[async_trait]
impl SynthesisTier for SecondaryTier {
    fn tier(&self) -> Tier {
        Tier::Secondary
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let direct_request = SynthesisRequest {
            model_id: self.model_id.clone(),
            ..request.clone()
        };

        let mut ctx: ExecutionContext<()> = self.contexts.acquire("secondary-synthesis");
        ctx.note("model_id", direct_request.model_id.as_str());

        let direct = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
            direct = self.synthesizer.synthesize(&direct_request) => direct?,
        };

        direct.into_audio(self.default_format, request.sample_rate)
    }
}

/// Tertiary tier: the tone generator.  Never fails.
pub struct ToneTier {
    generator: ToneGenerator,
}

impl ToneTier {
    pub fn new(generator: ToneGenerator) -> Self {
        Self { generator }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(ToneGenerator::new(
            config.tone_frequency_hz,
            config.tone_amplitude,
            config.tone_secs_per_char,
            config.tone_max_secs,
        ))
    }
}

#[async_trait]
impl SynthesisTier for ToneTier {
    fn tier(&self) -> Tier {
        Tier::Tertiary
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        Ok(SynthesizedAudio::Pcm(
            self.generator.generate(request.input_text(), request.sample_rate),
        ))
    }
}

// ---------------------------------------------------------------------------
// FallbackChain
// ---------------------------------------------------------------------------

/// What the chain produced and which failures it absorbed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub audio: SynthesizedAudio,
    pub tier: Tier,
    pub failures: Vec<(Tier, SynthesisError)>,
}

/// Ordered list of [`SynthesisTier`]s.
pub struct FallbackChain {
    tiers: Vec<Box<dyn SynthesisTier>>,
}

impl FallbackChain {
    pub fn new(tiers: Vec<Box<dyn SynthesisTier>>) -> Self {
        Self { tiers }
    }

    /// Primary, then secondary when `direct_enabled`, then the tone.
    pub fn from_config(
        primary: SynthesisStage,
        direct: Arc<dyn DirectSynthesizer>,
        config: &FallbackConfig,
        contexts: ContextRegistry,
    ) -> Self {
        let mut tiers: Vec<Box<dyn SynthesisTier>> = vec![Box::new(PrimaryTier::new(primary))];
        if config.direct_enabled {
            tiers.push(Box::new(SecondaryTier::new(direct, config, contexts)));
        }
        tiers.push(Box::new(ToneTier::from_config(config)));
        Self::new(tiers)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// Walk the tiers until one yields non-empty audio.
    ///
    /// Returns the last tier's error only when every tier failed, which
    /// cannot happen while a [`ToneTier`] terminates the chain.
    pub async fn run(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
    ) -> Result<FallbackOutcome, SynthesisError> {
        self.run_observed(request, cancel, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_attempt` right before each tier
    /// is tried.
    pub async fn run_observed<F>(
        &self,
        request: &SynthesisRequest,
        cancel: &CancelToken,
        mut on_attempt: F,
    ) -> Result<FallbackOutcome, SynthesisError>
    where
        F: FnMut(Tier) + Send,
    {
        let mut failures: Vec<(Tier, SynthesisError)> = Vec::new();

        for tier in &self.tiers {
            if cancel.is_cancelled() {
                return Err(SynthesisError::Cancelled);
            }

            on_attempt(tier.tier());
            let err = match tier.synthesize(request, cancel).await {
                Ok(audio) if audio.is_empty() => SynthesisError::EmptyAudio,
                Ok(audio) => {
                    if !failures.is_empty() {
                        log::info!(
                            "synthesis recovered on {} tier after {} failure(s)",
                            tier.tier(),
                            failures.len()
                        );
                    }
                    return Ok(FallbackOutcome {
                        audio,
                        tier: tier.tier(),
                        failures,
                    });
                }
                Err(SynthesisError::Cancelled) => return Err(SynthesisError::Cancelled),
                Err(err) => err,
            };

            log::warn!(
                "{} synthesis failed ({}): {err}; moving to next tier",
                tier.tier(),
                err.class()
            );
            failures.push((tier.tier(), err));
        }

        match failures.pop() {
            Some((_, err)) => Err(err),
            None => Err(SynthesisError::EmptyAudio),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
