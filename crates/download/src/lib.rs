//! Download stage
//!
//! Fetches source media with `yt-dlp`: one video-only artifact capped at a
//! 720p ceiling and one audio-only artifact extracted as WAV, both into a
//! per-session directory so concurrent sessions never collide on disk.
//! A duration limit is honored at fetch time via `--download-sections`,
//! never by post-processing.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;
use uuid::Uuid;

use video_dub_common::{probe_duration, ErrorType, PipelineError, Stage};

/// Stage name used in errors and result keys
pub const STAGE_NAME: &str = "download";

/// Resolution ceiling requested from the fetcher
const VIDEO_FORMAT: &str = "best[height<=720]";

/// User agent sent when no cookie file is configured
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Extensions recognized as video artifacts in the session directory
const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mkv"];

/// Duration cap applied identically to both fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationLimit {
    /// No trim arguments at all
    #[default]
    Full,
    /// Trim to the first N seconds at fetch time
    Seconds(u32),
}

impl FromStr for DurationLimit {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("full") {
            return Ok(Self::Full);
        }
        s.parse::<u32>().map(Self::Seconds).map_err(|_| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::FileFormat,
                format!("Invalid duration limit: {s} (expected \"full\" or seconds)"),
            )
        })
    }
}

/// Input record for the download stage
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source media URL
    pub source_url: String,
    /// Duration cap applied to both fetches
    pub duration_limit: DurationLimit,
    /// Pre-assigned session id; a fresh one is minted when absent
    pub session_id: Option<String>,
}

/// Output record for the download stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutput {
    pub session_id: String,
    pub audio_path: PathBuf,
    pub video_path: PathBuf,
    /// Audio duration in seconds; 0.0 when the probe fails (advisory only)
    pub duration: f64,
}

/// Fetcher authentication: a cookie file when configured and present on
/// disk, otherwise a browser user agent plus an Android player client hint.
#[derive(Debug, Clone, Default)]
pub struct FetchAuth {
    pub cookies_file: Option<PathBuf>,
}

impl FetchAuth {
    /// Read the cookie file location from `YTDLP_COOKIES_FILE`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cookies_file: std::env::var("YTDLP_COOKIES_FILE").ok().map(PathBuf::from),
        }
    }

    fn args(&self) -> Vec<String> {
        match &self.cookies_file {
            Some(path) if path.exists() => {
                vec!["--cookies".to_string(), path.display().to_string()]
            }
            _ => vec![
                "--add-header".to_string(),
                format!("User-Agent: {FALLBACK_USER_AGENT}"),
                "--extractor-args".to_string(),
                "youtube:player_client=android".to_string(),
            ],
        }
    }
}

/// Downloads source video and audio artifacts for one session
pub struct DownloadStage {
    output_root: PathBuf,
    auth: FetchAuth,
}

impl DownloadStage {
    /// Create a download stage writing session directories under
    /// `output_root`
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            auth: FetchAuth::default(),
        }
    }

    /// Replace the fetcher authentication settings
    #[must_use]
    pub fn with_auth(mut self, auth: FetchAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Artifact directory for one session
    #[must_use]
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.output_root.join(session_id)
    }

    async fn run_fetch(&self, args: &[String], what: &str) -> Result<(), PipelineError> {
        let output = Command::new("yt-dlp").args(args).output().await.map_err(|e| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::SubprocessError,
                format!("Failed to run yt-dlp: {e}"),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::DownloadError,
                format!("{what} download failed: {}", stderr.trim()),
            ));
        }

        Ok(())
    }
}

/// Trim arguments for a duration limit; `Full` adds none
fn trim_args(limit: DurationLimit) -> Vec<String> {
    match limit {
        DurationLimit::Full => Vec::new(),
        DurationLimit::Seconds(secs) => vec![
            "--download-sections".to_string(),
            format!("*0-{secs}"),
        ],
    }
}

/// Build the video-only fetch invocation (720p ceiling)
fn video_args(
    url: &str,
    session_dir: &Path,
    limit: DurationLimit,
    auth: &FetchAuth,
) -> Vec<String> {
    let mut args = vec![
        "--format".to_string(),
        VIDEO_FORMAT.to_string(),
        "--output".to_string(),
        session_dir.join("original_video.%(ext)s").display().to_string(),
    ];
    args.extend(trim_args(limit));
    args.extend(auth.args());
    args.push(url.to_string());
    args
}

/// Build the audio-only fetch invocation (WAV extraction)
fn audio_args(
    url: &str,
    session_dir: &Path,
    limit: DurationLimit,
    auth: &FetchAuth,
) -> Vec<String> {
    let mut args = vec![
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        "wav".to_string(),
        "--output".to_string(),
        session_dir.join("original_audio.%(ext)s").display().to_string(),
    ];
    args.extend(trim_args(limit));
    args.extend(auth.args());
    args.push(url.to_string());
    args
}

/// Locate exactly one audio and one video artifact by extension.
///
/// The error message lists the files actually present; operators rely on
/// that listing to diagnose partial fetches.
async fn scan_artifacts(session_dir: &Path) -> Result<(PathBuf, PathBuf), PipelineError> {
    let read_error = |e: std::io::Error| {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::FileNotFound,
            format!("Cannot read session directory {}: {e}", session_dir.display()),
        )
    };
    let mut entries = tokio::fs::read_dir(session_dir).await.map_err(read_error)?;

    let mut audio = None;
    let mut video = None;
    let mut present = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        let path = entry.path();
        present.push(entry.file_name().to_string_lossy().into_owned());
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if ext.eq_ignore_ascii_case("wav") {
            audio = Some(path);
        } else if VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)) {
            video = Some(path);
        }
    }

    match (audio, video) {
        (Some(audio), Some(video)) => Ok((audio, video)),
        _ => Err(PipelineError::new(
            STAGE_NAME,
            ErrorType::FileNotFound,
            format!("Downloaded files not found. Available: {present:?}"),
        )),
    }
}

#[async_trait]
impl Stage for DownloadStage {
    type Input = DownloadRequest;
    type Output = DownloadOutput;

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(&self, request: DownloadRequest) -> Result<DownloadOutput, PipelineError> {
        let session_id = request
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session_dir = self.session_dir(&session_id);

        tokio::fs::create_dir_all(&session_dir).await.map_err(|e| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::FileCreation,
                format!("Cannot create session directory {}: {e}", session_dir.display()),
            )
        })?;

        info!(
            "Starting download for session {}: {}",
            session_id, request.source_url
        );

        let audio = audio_args(
            &request.source_url,
            &session_dir,
            request.duration_limit,
            &self.auth,
        );
        self.run_fetch(&audio, "Audio").await?;

        let video = video_args(
            &request.source_url,
            &session_dir,
            request.duration_limit,
            &self.auth,
        );
        self.run_fetch(&video, "Video").await?;

        let (audio_path, video_path) = scan_artifacts(&session_dir).await?;
        let duration = probe_duration(&audio_path).await;

        info!(
            "Completed download for session {}: audio={}, video={}, duration={:.1}s",
            session_id,
            audio_path.display(),
            video_path.display(),
            duration
        );

        Ok(DownloadOutput {
            session_id,
            audio_path,
            video_path,
            duration,
        })
    }
}
