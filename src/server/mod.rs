//! HTTP surface (axum).
//!
//! | Route                  | Handler                  |
//! |------------------------|--------------------------|
//! | `POST /v1/speech`      | [`routes::synthesize`]   |
//! | `GET /v1/speech/{id}`  | [`routes::fetch_audio`]  |
//! | `GET /health`          | [`routes::health`]       |

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use crate::pipeline::{AudioCache, SpeechPipeline};
use crate::stream::ContextRegistry;

pub use error::{status_for, ApiError};
pub use routes::HealthReport;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SpeechPipeline>,
    pub cache: Arc<AudioCache>,
    pub contexts: ContextRegistry,
    pub started: Instant,
}

impl AppState {
    pub fn new(pipeline: SpeechPipeline, cache: AudioCache, contexts: ContextRegistry) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cache: Arc::new(cache),
            contexts,
            started: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/speech", post(routes::synthesize))
        .route("/v1/speech/{id}", get(routes::fetch_audio))
        .route("/health", get(routes::health))
        .with_state(state)
}

/// Bind `bind_addr` and serve until Ctrl-C.
pub async fn run_server(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("bind failed on {bind_addr}"))?;
    log::info!("listening on {bind_addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown requested");
}
