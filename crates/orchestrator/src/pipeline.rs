//! Sequential dubbing pipeline
//!
//! Stages run strictly in order and every failure propagates unmodified;
//! artifacts written by completed stages stay on disk for inspection or
//! manual resumption.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::info;

use video_dub_common::{PipelineError, Stage};
use video_dub_download::{DownloadOutput, DownloadRequest, DownloadStage, DurationLimit, FetchAuth};
use video_dub_overlay::{OverlayInput, OverlayOutput, OverlayStage};
use video_dub_synthesize::{SynthesizeOutput, SynthesizeRequest, SynthesizeStage};
use video_dub_transcribe::{TranscribeOutput, TranscribeStage};
use video_dub_translate::{TranslateOutput, TranslateRequest, TranslateStage};

use crate::progress::{checkpoint, PipelineObserver};

/// One dubbing request as the pipeline sees it
#[derive(Debug, Clone)]
pub struct DubJob {
    pub source_url: String,
    pub target_language: String,
    pub duration_limit: DurationLimit,
    /// Pre-assigned session id; the download stage mints one when absent
    pub session_id: Option<String>,
}

/// Aggregated output of one pipeline run, one record per completed stage
#[derive(Debug, Clone)]
pub struct PipelineResults {
    pub session_id: String,
    pub download: DownloadOutput,
    pub transcribe: TranscribeOutput,
    pub translate: TranslateOutput,
    pub synthesize: SynthesizeOutput,
    pub overlay: Option<OverlayOutput>,
}

impl PipelineResults {
    /// Serialize into a stage-name keyed map, the shape stored per session
    /// and returned by the result endpoint
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("download".to_string(), to_record(&self.download));
        map.insert("transcribe".to_string(), to_record(&self.transcribe));
        map.insert("translate".to_string(), to_record(&self.translate));
        map.insert("synthesize".to_string(), to_record(&self.synthesize));
        if let Some(overlay) = &self.overlay {
            map.insert("overlay".to_string(), to_record(overlay));
        }
        map
    }
}

fn to_record<T: serde::Serialize>(output: &T) -> Value {
    serde_json::to_value(output).unwrap_or(Value::Null)
}

/// The five-stage dubbing pipeline, generic over its stages so tests can
/// substitute stubs
pub struct DubbingPipeline<D, T, L, S, O> {
    download: D,
    transcribe: T,
    translate: L,
    synthesize: S,
    overlay: O,
}

/// Pipeline wired with the real stages
pub type DefaultPipeline =
    DubbingPipeline<DownloadStage, TranscribeStage, TranslateStage, SynthesizeStage, OverlayStage>;

impl DefaultPipeline {
    /// Wire the real stages from the environment, writing session
    /// artifacts under `output_root`.
    ///
    /// # Errors
    ///
    /// Fails fast with `missing_api_key` when a required credential is
    /// absent.
    pub fn from_env(output_root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let output_root = output_root.into();
        Ok(Self::new(
            DownloadStage::new(&output_root).with_auth(FetchAuth::from_env()),
            TranscribeStage::from_env()?,
            TranslateStage::from_env()?,
            SynthesizeStage::from_env(&output_root)?,
            OverlayStage::new(&output_root),
        ))
    }
}

impl<D, T, L, S, O> DubbingPipeline<D, T, L, S, O>
where
    D: Stage<Input = DownloadRequest, Output = DownloadOutput>,
    T: Stage<Input = PathBuf, Output = TranscribeOutput>,
    L: Stage<Input = TranslateRequest, Output = TranslateOutput>,
    S: Stage<Input = SynthesizeRequest, Output = SynthesizeOutput>,
    O: Stage<Input = OverlayInput, Output = OverlayOutput>,
{
    pub fn new(download: D, transcribe: T, translate: L, synthesize: S, overlay: O) -> Self {
        Self {
            download,
            transcribe,
            translate,
            synthesize,
            overlay,
        }
    }

    /// Run download through synthesize, reporting stage boundaries to
    /// `observer`. The dubbed audio is the final artifact; the original
    /// video stays untouched in the session directory.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure unmodified.
    pub async fn dub_audio(
        &self,
        job: DubJob,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineResults, PipelineError> {
        self.run(job, observer, false).await
    }

    /// Run the full pipeline including the overlay remux.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure unmodified.
    pub async fn dub_video(
        &self,
        job: DubJob,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineResults, PipelineError> {
        self.run(job, observer, true).await
    }

    async fn run(
        &self,
        job: DubJob,
        observer: &dyn PipelineObserver,
        include_overlay: bool,
    ) -> Result<PipelineResults, PipelineError> {
        info!(
            "Starting dubbing pipeline: url={}, target_language={}",
            job.source_url, job.target_language
        );

        let stage = self.download.name();
        observer.on_stage_start(stage, checkpoint(stage)).await;
        let download = self
            .download
            .process(DownloadRequest {
                source_url: job.source_url,
                duration_limit: job.duration_limit,
                session_id: job.session_id,
            })
            .await?;
        let session_id = download.session_id.clone();
        observer.on_stage_complete(stage, to_record(&download)).await;

        let stage = self.transcribe.name();
        observer.on_stage_start(stage, checkpoint(stage)).await;
        let transcribe = self.transcribe.process(download.audio_path.clone()).await?;
        observer.on_stage_complete(stage, to_record(&transcribe)).await;

        let stage = self.translate.name();
        observer.on_stage_start(stage, checkpoint(stage)).await;
        let translate = self
            .translate
            .process(TranslateRequest {
                transcription: transcribe.clone(),
                target_language: job.target_language,
            })
            .await?;
        observer.on_stage_complete(stage, to_record(&translate)).await;

        let stage = self.synthesize.name();
        observer.on_stage_start(stage, checkpoint(stage)).await;
        let synthesize = self
            .synthesize
            .process(SynthesizeRequest {
                translation: translate.clone(),
                session_id: Some(session_id.clone()),
            })
            .await?;
        observer.on_stage_complete(stage, to_record(&synthesize)).await;

        let overlay = if include_overlay {
            let stage = self.overlay.name();
            observer.on_stage_start(stage, checkpoint(stage)).await;
            let overlay = self
                .overlay
                .process(OverlayInput {
                    video_path: Some(download.video_path.clone()),
                    dubbed_audio_path: Some(synthesize.synthesized_audio_path.clone()),
                    session_id: Some(session_id.clone()),
                })
                .await?;
            observer.on_stage_complete(stage, to_record(&overlay)).await;
            Some(overlay)
        } else {
            None
        };

        info!("Completed dubbing pipeline for session {session_id}");

        Ok(PipelineResults {
            session_id,
            download,
            transcribe,
            translate,
            synthesize,
            overlay,
        })
    }
}
