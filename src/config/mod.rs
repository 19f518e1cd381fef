//! Configuration module for the text-to-voice service.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, `AppPaths` for cross-platform config directories, TOML persistence
//! via `AppConfig::load` / `AppConfig::save`, and environment overrides for
//! credentials.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, CacheConfig, FallbackConfig, PayloadFormat, PipelineConfig, ServerConfig,
    SynthesisConfig, TranslationConfig, TranslationProviderKind,
};
