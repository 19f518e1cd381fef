//! Application entry point: text-to-voice HTTP service.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run) and overlay
//!    environment credentials.
//! 3. Create the [`tokio`] runtime.
//! 4. Build the pipeline with HTTP providers from config.
//! 5. Serve the axum router until Ctrl-C.

use anyhow::{Context, Result};
use text_to_voice::{
    config::AppConfig,
    pipeline::{AudioCache, PipelineBuilder},
    server::{run_server, AppState},
    stream::ContextRegistry,
};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("text-to-voice starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_env_overrides();

    if config.synthesis.credential().is_none() {
        log::warn!("No synthesis credential configured; every request will fail until one is set");
    }
    if config.translation.is_active() && config.translation.credential().is_none() {
        log::warn!("No translation credential configured; cross-language requests will fail");
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Pipeline
    let contexts = ContextRegistry::new();
    let pipeline = PipelineBuilder::new(&config)
        .contexts(contexts.clone())
        .build();
    let state = AppState::new(pipeline, AudioCache::from_config(&config.cache), contexts);

    // 5. Serve
    rt.block_on(run_server(state, &config.server.bind_addr))?;

    log::info!("text-to-voice stopped");
    Ok(())
}
