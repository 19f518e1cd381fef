//! Request handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::audio::WAV_MIME_TYPE;
use crate::pipeline::{PipelineResult, SpeechRequest};
use crate::stream::CancelToken;

use super::error::ApiError;
use super::AppState;

pub const AUDIO_ID_HEADER: HeaderName = HeaderName::from_static("x-audio-id");
pub const TIER_HEADER: HeaderName = HeaderName::from_static("x-synthesis-tier");
pub const DEGRADED_HEADER: HeaderName = HeaderName::from_static("x-degraded");

/// `POST /v1/speech`
///
/// Runs the pipeline, stores the audio in the cache and returns it.  A client
/// that disconnects drops this future, which releases every execution
/// context the run holds.
pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadBody(rejection.body_text()))?;

    log::info!(
        "speech request: {} chars, language {:?}, voice {:?}",
        request.text.chars().count(),
        request.language_tag,
        request.voice_hint
    );

    let run = state.pipeline.run(&request, &CancelToken::new()).await;
    log::debug!("speech request states: {:?}", run.trace.states());

    let (audio, tier) = match run.result {
        PipelineResult::Success(audio) => (audio, crate::synth::Tier::Primary),
        PipelineResult::Degraded(audio, tier) => (audio, tier),
        PipelineResult::Failure(err) => {
            log::error!("speech request failed ({}): {err}", err.kind());
            return Err(err.into());
        }
    };

    let body = audio.bytes().to_vec();
    let id = state.cache.insert(audio);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, WAV_MIME_TYPE.to_string()),
            (AUDIO_ID_HEADER, id.to_string()),
            (TIER_HEADER, tier.label().to_string()),
            (DEGRADED_HEADER, tier.is_degraded().to_string()),
        ],
        body,
    )
        .into_response())
}

/// `GET /v1/speech/{id}`
pub async fn fetch_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;
    let audio = state.cache.get(&id).ok_or(ApiError::NotFound)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, WAV_MIME_TYPE)],
        audio.bytes().to_vec(),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub cached_entries: usize,
    pub live_contexts: usize,
    pub uptime_secs: u64,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        cached_entries: state.cache.len(),
        live_contexts: state.contexts.live(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
