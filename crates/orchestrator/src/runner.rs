//! Background session runner
//!
//! One pipeline invocation per session, driven to a terminal snapshot in
//! the store. The runner is the only writer for its session; pollers read
//! concurrently through the store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use video_dub_common::Stage;
use video_dub_download::{DownloadOutput, DownloadRequest};
use video_dub_overlay::{OverlayInput, OverlayOutput};
use video_dub_synthesize::{SynthesizeOutput, SynthesizeRequest};
use video_dub_transcribe::TranscribeOutput;
use video_dub_translate::{TranslateOutput, TranslateRequest};

use crate::pipeline::{DubJob, DubbingPipeline};
use crate::progress::{self, PipelineObserver};
use crate::registry::{SessionStatus, SessionStore};

/// Observer that mirrors stage boundaries into the session store
pub struct RegistryObserver {
    store: Arc<dyn SessionStore>,
    session_id: String,
}

impl RegistryObserver {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl PipelineObserver for RegistryObserver {
    async fn on_stage_start(&self, stage: &'static str, progress: u8) {
        self.store
            .update(
                &self.session_id,
                Box::new(move |snapshot| {
                    snapshot.status = SessionStatus::Processing;
                    snapshot.current_stage = Some(stage.to_string());
                    snapshot.advance_progress(progress);
                }),
            )
            .await;
    }

    async fn on_stage_complete(&self, stage: &'static str, record: Value) {
        self.store
            .update(
                &self.session_id,
                Box::new(move |snapshot| {
                    snapshot.results.insert(stage.to_string(), record);
                }),
            )
            .await;
    }
}

/// Drive one session's pipeline run to a terminal snapshot.
///
/// The session must already exist in the store as `queued`. All failures
/// land in the snapshot as a classified error; this function never
/// returns one.
pub async fn run_session<D, T, L, S, O>(
    store: Arc<dyn SessionStore>,
    pipeline: Arc<DubbingPipeline<D, T, L, S, O>>,
    session_id: String,
    mut job: DubJob,
) where
    D: Stage<Input = DownloadRequest, Output = DownloadOutput>,
    T: Stage<Input = PathBuf, Output = TranscribeOutput>,
    L: Stage<Input = TranslateRequest, Output = TranslateOutput>,
    S: Stage<Input = SynthesizeRequest, Output = SynthesizeOutput>,
    O: Stage<Input = OverlayInput, Output = OverlayOutput>,
{
    job.session_id = Some(session_id.clone());
    let observer = RegistryObserver::new(Arc::clone(&store), session_id.clone());

    match pipeline.dub_video(job, &observer).await {
        Ok(results) => {
            info!("Session {session_id} completed");
            let results_map = results.to_map();
            store
                .update(
                    &session_id,
                    Box::new(move |snapshot| {
                        snapshot.status = SessionStatus::Completed;
                        snapshot.current_stage = None;
                        snapshot.advance_progress(progress::COMPLETED);
                        snapshot.results = results_map;
                    }),
                )
                .await;
        }
        Err(err) => {
            error!("Session {session_id} failed: {err}");
            store
                .update(
                    &session_id,
                    Box::new(move |snapshot| {
                        snapshot.status = SessionStatus::Error;
                        snapshot.error = Some(err.into());
                    }),
                )
                .await;
        }
    }
}
