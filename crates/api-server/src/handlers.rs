//! HTTP request handlers for the dubbing API

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::types::{
    DownloadStageRequest, DubAcceptedResponse, DubRequest, DubResultResponse, HealthResponse,
    TranscribeStageRequest,
};
use crate::ApiState;
use video_dub_common::{ErrorType, PipelineError, Stage};
use video_dub_download::{DownloadRequest, DurationLimit};
use video_dub_orchestrator::{
    run_session, DubJob, NoopObserver, SessionError, SessionSnapshot, SessionStatus,
};

/// Classified error payload with its HTTP status
type ErrorBody = (StatusCode, Json<SessionError>);

fn classified(status: StatusCode, err: PipelineError) -> ErrorBody {
    (status, Json(err.into()))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Turn an API request into a pipeline job, rejecting bad input before
/// anything is queued
fn validate(request: &DubRequest) -> Result<DubJob, PipelineError> {
    if request.source_url.trim().is_empty() {
        return Err(PipelineError::new(
            "download",
            ErrorType::MissingInput,
            "Source URL is required",
        )
        .non_retryable());
    }
    if request.target_language.trim().is_empty() {
        return Err(PipelineError::new(
            "translate",
            ErrorType::MissingInput,
            "Target language is required",
        )
        .non_retryable());
    }
    let duration_limit: DurationLimit = request.duration.parse()?;

    Ok(DubJob {
        source_url: request.source_url.trim().to_string(),
        target_language: request.target_language.trim().to_string(),
        duration_limit,
        session_id: None,
    })
}

/// Accept a dubbing request and run it in the background.
///
/// Returns 202 immediately; progress and results are available through
/// the session endpoints.
pub async fn submit_dub(
    State(state): State<ApiState>,
    Json(request): Json<DubRequest>,
) -> Result<impl IntoResponse, ErrorBody> {
    let job = validate(&request).map_err(|e| classified(StatusCode::BAD_REQUEST, e))?;

    let session_id = Uuid::new_v4().to_string();
    info!(
        "Dubbing request accepted: session={}, url={}, target_language={}",
        session_id, job.source_url, job.target_language
    );

    state
        .store
        .insert(SessionSnapshot::queued(session_id.clone()))
        .await;

    tokio::spawn(run_session(
        Arc::clone(&state.store),
        Arc::clone(&state.pipeline),
        session_id.clone(),
        job,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(DubAcceptedResponse {
            session_id,
            status: SessionStatus::Queued,
        }),
    ))
}

/// Run a dubbing request inline and return the full results bundle.
///
/// A classified stage failure maps to 422 with the classification intact.
pub async fn submit_dub_sync(
    State(state): State<ApiState>,
    Json(request): Json<DubRequest>,
) -> Result<impl IntoResponse, ErrorBody> {
    let job = validate(&request).map_err(|e| classified(StatusCode::BAD_REQUEST, e))?;
    info!(
        "Synchronous dubbing request: url={}, target_language={}",
        job.source_url, job.target_language
    );

    let results = state
        .pipeline
        .dub_video(job, &NoopObserver)
        .await
        .map_err(|e| classified(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    Ok(Json(DubResultResponse {
        session_id: results.session_id.clone(),
        status: SessionStatus::Completed,
        results: results.to_map(),
    }))
}

/// Get a session's current snapshot
pub async fn get_session_status(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.store.get(&session_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("Session not found: {session_id}"),
        )),
    }
}

/// Get a completed session's results bundle.
///
/// Sessions that are still running, queued, or failed answer 409 so a
/// poller can tell "not yet" apart from "never existed".
pub async fn get_session_result(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(snapshot) = state.store.get(&session_id).await else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Session not found: {session_id}"),
        ));
    };

    if snapshot.status != SessionStatus::Completed {
        return Err((
            StatusCode::CONFLICT,
            format!(
                "Session {session_id} is not completed (status: {})",
                snapshot.status.as_str()
            ),
        ));
    }

    Ok(Json(DubResultResponse {
        session_id: snapshot.session_id,
        status: snapshot.status,
        results: snapshot.results,
    }))
}

/// Run the download stage alone, for development and manual resumption
pub async fn run_download_stage(
    State(state): State<ApiState>,
    Json(request): Json<DownloadStageRequest>,
) -> Result<impl IntoResponse, ErrorBody> {
    let duration_limit: DurationLimit = request
        .duration
        .parse()
        .map_err(|e| classified(StatusCode::BAD_REQUEST, e))?;

    let output = state
        .download
        .process(DownloadRequest {
            source_url: request.source_url,
            duration_limit,
            session_id: None,
        })
        .await
        .map_err(|e| classified(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    Ok(Json(output))
}

/// Run the transcribe stage alone against an audio file on disk
pub async fn run_transcribe_stage(
    State(state): State<ApiState>,
    Json(request): Json<TranscribeStageRequest>,
) -> Result<impl IntoResponse, ErrorBody> {
    let output = state
        .transcribe
        .process(PathBuf::from(request.audio_path))
        .await
        .map_err(|e| classified(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    Ok(Json(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(source_url: &str, language: &str, duration: &str) -> DubRequest {
        DubRequest {
            source_url: source_url.to_string(),
            target_language: language.to_string(),
            duration: duration.to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        let job = validate(&request("https://example.com/v", "spanish", "full")).unwrap();
        assert_eq!(job.duration_limit, DurationLimit::Full);
        assert!(job.session_id.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let err = validate(&request("  ", "spanish", "full")).unwrap_err();
        assert_eq!(err.error_type, ErrorType::MissingInput);
        assert_eq!(err.stage, "download");
    }

    #[test]
    fn test_validate_rejects_empty_language() {
        let err = validate(&request("https://example.com/v", "", "full")).unwrap_err();
        assert_eq!(err.error_type, ErrorType::MissingInput);
        assert_eq!(err.stage, "translate");
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        let err = validate(&request("https://example.com/v", "es", "forever")).unwrap_err();
        assert_eq!(err.error_type, ErrorType::FileFormat);
    }

    #[test]
    fn test_validate_trims_fields() {
        let job = validate(&request(" https://example.com/v ", " spanish ", "30")).unwrap();
        assert_eq!(job.source_url, "https://example.com/v");
        assert_eq!(job.target_language, "spanish");
        assert_eq!(job.duration_limit, DurationLimit::Seconds(30));
    }
}
