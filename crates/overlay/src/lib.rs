//! Overlay stage
//!
//! Replaces the original audio track with the synthesized one via an
//! external `ffmpeg` remux: the video stream is copied unmodified, the
//! audio stream is encoded to AAC, and the output is truncated to the
//! shorter of the two inputs. Length mismatches are resolved by
//! truncation, never by padding silence or freezing frames.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{error, info, warn};

use video_dub_common::{probe_duration, ErrorType, PipelineError, Stage};

/// Stage name used in errors and result keys
pub const STAGE_NAME: &str = "overlay";

/// Outputs below this size indicate a silently failed remux
const MIN_OUTPUT_BYTES: u64 = 1024;

/// Input record for the overlay stage.
///
/// Fields are optional so the stage can validate its own inputs when
/// invoked standalone; absent paths fail with `missing_input` before any
/// file-existence check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayInput {
    #[serde(default)]
    pub video_path: Option<PathBuf>,
    #[serde(default)]
    pub dubbed_audio_path: Option<PathBuf>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Output record for the overlay stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayOutput {
    pub final_video_path: PathBuf,
    pub file_size_bytes: u64,
    pub duration_seconds: f64,
    pub session_id: String,
}

/// Build the remux invocation: copy video, encode audio to AAC, map the
/// video stream from the first input and the audio stream from the
/// second, truncate to the shorter input.
fn remux_args(video_path: &Path, audio_path: &Path, output_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video_path.display().to_string(),
        "-i".to_string(),
        audio_path.display().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-shortest".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        output_path.display().to_string(),
    ]
}

/// Remuxes dubbed audio onto the original video
pub struct OverlayStage {
    output_root: PathBuf,
}

impl OverlayStage {
    /// Create an overlay stage writing final videos under `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }
}

#[async_trait]
impl Stage for OverlayStage {
    type Input = OverlayInput;
    type Output = OverlayOutput;

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(&self, input: OverlayInput) -> Result<OverlayOutput, PipelineError> {
        let (Some(video_path), Some(dubbed_audio_path)) =
            (input.video_path, input.dubbed_audio_path)
        else {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::MissingInput,
                "Video path and dubbed audio path are required",
            ));
        };

        if !video_path.exists() {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::FileNotFound,
                format!("Video file not found: {}", video_path.display()),
            ));
        }
        if !dubbed_audio_path.exists() {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::FileNotFound,
                format!("Dubbed audio file not found: {}", dubbed_audio_path.display()),
            ));
        }

        let session_id = input.session_id.unwrap_or_else(|| "unknown".to_string());
        info!(
            "Starting overlay for session {}: video={}, audio={}",
            session_id,
            video_path.display(),
            dubbed_audio_path.display()
        );

        // Earlier stages normally create this directory, but the stage
        // tolerates standalone invocation for resumability.
        let session_dir = self.output_root.join(&session_id);
        if !session_dir.exists() {
            tokio::fs::create_dir_all(&session_dir).await.map_err(|e| {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::FileCreation,
                    format!("Cannot create session directory {}: {e}", session_dir.display()),
                )
            })?;
            warn!(
                "Session directory did not exist, created: {}",
                session_dir.display()
            );
        }

        let output_path = session_dir.join("final_dubbed_video.mp4");
        let args = remux_args(&video_path, &dubbed_audio_path, &output_path);

        let output = Command::new("ffmpeg").args(&args).output().await.map_err(|e| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::SubprocessError,
                format!("Failed to run ffmpeg: {e}"),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffmpeg failed with {}: {}", output.status, stderr.trim());
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::FfmpegError,
                format!("Video overlay failed: {}", stderr.trim()),
            )
            .non_retryable());
        }

        if !output_path.exists() {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::OutputNotCreated,
                "Output video file was not created",
            ));
        }

        let file_size = tokio::fs::metadata(&output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if file_size < MIN_OUTPUT_BYTES {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::OutputTooSmall,
                format!("Output file is suspiciously small: {file_size} bytes"),
            ));
        }

        let duration_seconds = probe_duration(&output_path).await;

        info!(
            "Completed overlay for session {}: {} ({} bytes, {:.1}s)",
            session_id,
            output_path.display(),
            file_size,
            duration_seconds
        );

        Ok(OverlayOutput {
            final_video_path: output_path,
            file_size_bytes: file_size,
            duration_seconds,
            session_id,
        })
    }
}
