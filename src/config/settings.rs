//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Missing keys in a settings file fall back to their defaults.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::stream::DEFAULT_MAX_LINE_BYTES;

/// Environment overrides applied by [`AppConfig::apply_env_overrides`].
pub const TRANSLATION_KEY_ENV: &str = "TTV_TRANSLATION_API_KEY";
pub const SYNTHESIS_KEY_ENV: &str = "TTV_SYNTHESIS_API_KEY";
pub const BIND_ADDR_ENV: &str = "TTV_BIND_ADDR";

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Request validation and stream limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Locale family that needs no translation (e.g. `"en"`).  Compared by
    /// primary language subtag.
    pub default_locale: String,
    /// Maximum input length in characters.
    pub max_text_chars: usize,
    /// Maximum number of chunks accepted from a single streamed response.
    pub max_stream_chunks: usize,
    /// Maximum length of one SSE/NDJSON line, in bytes.
    pub max_line_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".into(),
            max_text_chars: 5_000,
            max_stream_chunks: 10_000,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// TranslationConfig
// ---------------------------------------------------------------------------

/// Selects which backend handles translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranslationProviderKind {
    /// Any OpenAI-compatible chat-completions API (OpenAI, Groq, Ollama …).
    OpenAiCompatible,
    /// Translation disabled; requests are always spoken in their original text.
    Disabled,
}

impl Default for TranslationProviderKind {
    fn default() -> Self {
        Self::OpenAiCompatible
    }
}

impl TranslationProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatible",
            Self::Disabled => "disabled",
        }
    }
}

/// Settings for the translation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Whether translation runs at all.
    pub enabled: bool,
    /// Which backend to use.
    pub provider: TranslationProviderKind,
    /// Base URL of the API endpoint (e.g. `https://api.openai.com`).
    pub base_url: String,
    /// API credential.  Required whenever a request needs translation.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds for the whole translation call, body included.
    pub timeout_secs: u64,
    /// Request a streamed (SSE) response instead of a single JSON body.
    pub streaming: bool,
}

impl TranslationConfig {
    /// The credential, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    /// `true` when translation is switched on and has a provider.
    pub fn is_active(&self) -> bool {
        self.enabled && self.provider != TranslationProviderKind::Disabled
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: TranslationProviderKind::default(),
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
            timeout_secs: 20,
            streaming: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisConfig
// ---------------------------------------------------------------------------

/// Settings for the primary (streaming) synthesis provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Base URL of the streaming synthesis API.
    pub base_url: String,
    /// API credential.  Required for every request.
    pub api_key: Option<String>,
    /// Model identifier sent with every synthesis request.
    pub model_id: String,
    /// Voice used when the request's hint is empty or unknown.
    pub voice_id: String,
    /// Output sample rate in Hz.  Also the rate written into every container.
    pub sample_rate: u32,
    /// Maximum seconds for the whole synthesis call, body included.
    pub timeout_secs: u64,
    /// Voice-hint → voice-id table (e.g. `"female" = "…"`).
    pub voices: BTreeMap<String, String>,
}

impl SynthesisConfig {
    /// The credential, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    /// Resolve a request's voice hint to a provider voice id.
    pub fn voice_for(&self, hint: &str) -> &str {
        let hint = hint.trim();
        if hint.is_empty() {
            return &self.voice_id;
        }
        self.voices
            .get(hint)
            .or_else(|| self.voices.get(&hint.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or(&self.voice_id)
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8880".into(),
            api_key: None,
            model_id: "tts-streaming-1".into(),
            voice_id: "default".into(),
            sample_rate: 24_000,
            timeout_secs: 30,
            voices: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// FallbackConfig
// ---------------------------------------------------------------------------

/// How the secondary endpoint's `audioContent` should be interpreted when
/// the response does not tag it itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// A complete RIFF/WAVE file, passed through unmodified.
    Wav,
    /// Raw little-endian f32 mono samples, run through the encoder.
    PcmF32le,
}

impl PayloadFormat {
    /// Parse the wire tag used in secondary responses.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" | "audio/wav" | "linear16_wav" => Some(Self::Wav),
            "pcm_f32le" | "f32le" | "pcm_float" => Some(Self::PcmF32le),
            _ => None,
        }
    }
}

impl Default for PayloadFormat {
    fn default() -> Self {
        Self::Wav
    }
}

/// Settings for the degraded synthesis tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether the secondary (single-call) endpoint is tried at all.
    pub direct_enabled: bool,
    /// Full URL of the secondary endpoint.
    pub direct_url: String,
    /// Model identifier for the secondary endpoint.
    pub direct_model_id: String,
    /// Payload interpretation when the response carries no `audioEncoding`.
    pub direct_payload_format: PayloadFormat,
    /// Maximum seconds for the secondary call.
    pub direct_timeout_secs: u64,
    /// Tone frequency in Hz for the last-resort tier.
    pub tone_frequency_hz: f32,
    /// Tone amplitude (clamped to 0.9).
    pub tone_amplitude: f32,
    /// Tone seconds per input character.
    pub tone_secs_per_char: f64,
    /// Tone length cap in seconds.
    pub tone_max_secs: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            direct_enabled: true,
            direct_url: "http://localhost:8880/v1/tts".into(),
            direct_model_id: "tts-standard-1".into(),
            direct_payload_format: PayloadFormat::default(),
            direct_timeout_secs: 20,
            tone_frequency_hz: 440.0,
            tone_amplitude: 0.3,
            tone_secs_per_char: 0.1,
            tone_max_secs: 3.0,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Bounds for the process-wide encoded-audio cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of stored results; the oldest is evicted first.
    pub max_entries: usize,
    /// Seconds after which a stored result expires.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl_secs: 3_600,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use text_to_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
///
/// // Write a copy elsewhere
/// config.save_to(std::path::Path::new("/tmp/settings.toml")).unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Validation and stream limits.
    pub pipeline: PipelineConfig,
    /// Translation step settings.
    pub translation: TranslationConfig,
    /// Primary synthesis provider settings.
    pub synthesis: SynthesisConfig,
    /// Degraded tier settings.
    pub fallback: FallbackConfig,
    /// Result cache bounds.
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from `$TTV_CONFIG` or the platform-appropriate
    /// `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().resolve_settings_file())
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay credentials and the bind address from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values produced by `lookup`; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(TRANSLATION_KEY_ENV) {
            self.translation.api_key = Some(key);
        }
        if let Some(key) = get(SYNTHESIS_KEY_ENV) {
            self.synthesis.api_key = Some(key);
        }
        if let Some(addr) = get(BIND_ADDR_ENV) {
            self.server.bind_addr = addr;
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
