//! REST API for the video dubbing pipeline
//!
//! Thin HTTP surface over the orchestrator: submit dubbing jobs
//! (background or inline), poll session status, and fetch completed
//! results. Individual stages are also exposed for development use.

mod handlers;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use video_dub_common::PipelineError;
use video_dub_download::{DownloadStage, FetchAuth};
use video_dub_orchestrator::{DefaultPipeline, InMemorySessionStore, SessionStore};
use video_dub_transcribe::TranscribeStage;

pub use handlers::*;
pub use types::*;

/// Server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Fully wired pipeline for dub requests
    pub pipeline: Arc<DefaultPipeline>,
    /// Session registry
    pub store: Arc<dyn SessionStore>,
    /// Standalone download stage for the dev endpoint
    pub download: Arc<DownloadStage>,
    /// Standalone transcribe stage for the dev endpoint
    pub transcribe: Arc<TranscribeStage>,
}

impl ApiState {
    pub fn new(
        pipeline: DefaultPipeline,
        download: DownloadStage,
        transcribe: TranscribeStage,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store: Arc::new(InMemorySessionStore::new()),
            download: Arc::new(download),
            transcribe: Arc::new(transcribe),
        }
    }

    /// Wire everything from the environment, writing session artifacts
    /// under `output_root`.
    ///
    /// # Errors
    ///
    /// Fails fast with `missing_api_key` when a required credential is
    /// absent.
    pub fn from_env(output_root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let output_root = output_root.into();
        Ok(Self::new(
            DefaultPipeline::from_env(&output_root)?,
            DownloadStage::new(&output_root).with_auth(FetchAuth::from_env()),
            TranscribeStage::from_env()?,
        ))
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Dubbing jobs
        .route("/api/v1/dub", post(submit_dub))
        .route("/api/v1/dub/sync", post(submit_dub_sync))
        // Session polling
        .route("/api/v1/sessions/{session_id}/status", get(get_session_status))
        .route("/api/v1/sessions/{session_id}/result", get(get_session_result))
        // Individual stages for development
        .route("/api/v1/stages/download", post(run_download_stage))
        .route("/api/v1/stages/transcribe", post(run_transcribe_stage))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting dubbing API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
