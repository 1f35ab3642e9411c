//! Synthesize stage
//!
//! Generates target-language speech from the translated text via the
//! ElevenLabs text-to-speech API, using the multilingual model and a
//! voice resolved by the language→voice selection policy. Audio bytes
//! are streamed, concatenated, and persisted under the session's
//! artifact directory.

pub mod voice;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use video_dub_common::{ErrorType, PipelineError, Stage};
use video_dub_translate::TranslateOutput;

pub use voice::{select_voice, DEFAULT_VOICE};

/// Stage name used in errors and result keys
pub const STAGE_NAME: &str = "synthesize";

const TEXT_TO_SPEECH_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const MODEL_ID: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Input record for the synthesize stage
#[derive(Debug, Clone)]
pub struct SynthesizeRequest {
    pub translation: TranslateOutput,
    /// Session whose artifact directory receives the audio; a timestamped
    /// fallback path is used when absent
    pub session_id: Option<String>,
}

/// Output record for the synthesize stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeOutput {
    pub synthesized_audio_path: PathBuf,
    pub language: String,
    pub voice_used: String,
    pub text_length: usize,
}

/// Map a failed text-to-speech call onto the error taxonomy
fn classify(status: Option<u16>, detail: &str) -> PipelineError {
    let lower = detail.to_lowercase();
    if status == Some(429) || lower.contains("rate limit") {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::RateLimit,
            format!("Text-to-speech rate limit exceeded: {detail}"),
        )
    } else if lower.contains("voice") {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::VoiceError,
            format!("Voice not available: {detail}"),
        )
    } else if lower.contains("model") {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::ModelError,
            format!("TTS model unavailable: {detail}"),
        )
    } else if matches!(status, Some(401 | 403))
        || lower.contains("api key")
        || lower.contains("authentication")
    {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::AuthError,
            format!("Text-to-speech authentication failed: {detail}"),
        )
        .non_retryable()
    } else {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::TtsError,
            format!("Text-to-speech failed: {detail}"),
        )
    }
}

/// Synthesizes dubbed speech via the external text-to-speech service
#[derive(Debug)]
pub struct SynthesizeStage {
    api_key: String,
    client: reqwest::Client,
    output_root: PathBuf,
}

impl SynthesizeStage {
    /// Create the stage with an explicit API key.
    ///
    /// # Errors
    ///
    /// Fails fast with `missing_api_key` (non-retryable) on an empty key.
    pub fn new(
        api_key: impl Into<String>,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::MissingApiKey,
                "ELEVENLABS_API_KEY not found in environment",
            )
            .non_retryable());
        }
        Ok(Self {
            api_key,
            client: reqwest::Client::new(),
            output_root: output_root.into(),
        })
    }

    /// Create the stage from `ELEVENLABS_API_KEY`
    pub fn from_env(output_root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        Self::new(
            std::env::var("ELEVENLABS_API_KEY").unwrap_or_default(),
            output_root,
        )
    }

    /// Destination for the synthesized audio: the session's artifact
    /// directory, or a process-wide timestamped fallback without one.
    fn output_path(&self, session_id: Option<&str>) -> PathBuf {
        match session_id {
            Some(id) => self.output_root.join(id).join("dubbed_audio.mp3"),
            None => {
                warn!("No session id provided, writing synthesized audio to fallback path");
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |d| d.as_secs());
                self.output_root.join(format!("synthesized_{timestamp}.mp3"))
            }
        }
    }
}

#[async_trait]
impl Stage for SynthesizeStage {
    type Input = SynthesizeRequest;
    type Output = SynthesizeOutput;

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(&self, request: SynthesizeRequest) -> Result<SynthesizeOutput, PipelineError> {
        let text = request.translation.translated_text;
        let language = request.translation.target_language;

        info!(
            "Generating {} speech from {} characters",
            language,
            text.len()
        );

        let voice_id = select_voice(&language);
        let output_path = self.output_path(request.session_id.as_deref());

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::FileCreation,
                    format!("Cannot create output directory {}: {e}", parent.display()),
                )
            })?;
        }

        let mut response = self
            .client
            .post(format!("{TEXT_TO_SPEECH_URL}/{voice_id}"))
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", &self.api_key)
            .json(&json!({ "text": text, "model_id": MODEL_ID }))
            .send()
            .await
            .map_err(|e| {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::NetworkError,
                    format!("Text-to-speech request failed: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify(Some(status.as_u16()), &detail));
        }

        // The service streams chunked audio; concatenate before writing.
        let mut audio = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::NetworkError,
                format!("Text-to-speech stream interrupted: {e}"),
            )
        })? {
            audio.extend_from_slice(&chunk);
        }

        tokio::fs::write(&output_path, &audio).await.map_err(|e| {
            PipelineError::new(
                STAGE_NAME,
                ErrorType::FileCreation,
                format!("Failed to write audio file {}: {e}", output_path.display()),
            )
        })?;

        if !output_path.exists() {
            return Err(PipelineError::new(
                STAGE_NAME,
                ErrorType::FileCreation,
                format!("Failed to create audio file at {}", output_path.display()),
            ));
        }

        info!(
            "Generated audio file {} using voice '{}'",
            output_path.display(),
            voice_id
        );

        Ok(SynthesizeOutput {
            synthesized_audio_path: output_path,
            language,
            voice_used: voice_id.to_string(),
            text_length: text.chars().count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> SynthesizeStage {
        SynthesizeStage::new("test_key", "outputs/sessions").unwrap()
    }

    #[test]
    fn test_empty_key_rejected_at_construction() {
        let err = SynthesizeStage::new("", "outputs/sessions").unwrap_err();
        assert_eq!(err.error_type, ErrorType::MissingApiKey);
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_output_path_uses_session_directory() {
        let path = stage().output_path(Some("abc-123"));
        assert_eq!(
            path,
            PathBuf::from("outputs/sessions/abc-123/dubbed_audio.mp3")
        );
    }

    #[test]
    fn test_output_paths_never_collide_across_sessions() {
        let stage = stage();
        assert_ne!(
            stage.output_path(Some("session-a")),
            stage.output_path(Some("session-b"))
        );
    }

    #[test]
    fn test_output_path_fallback_without_session() {
        let path = stage().output_path(None);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("synthesized_"));
        assert!(name.ends_with(".mp3"));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify(Some(429), "quota exhausted");
        assert_eq!(err.error_type, ErrorType::RateLimit);
    }

    #[test]
    fn test_classify_voice_error() {
        let err = classify(Some(400), "voice not found");
        assert_eq!(err.error_type, ErrorType::VoiceError);
    }

    #[test]
    fn test_classify_model_error() {
        let err = classify(Some(400), "model does not exist");
        assert_eq!(err.error_type, ErrorType::ModelError);
    }

    #[test]
    fn test_classify_auth_error_not_retryable() {
        let err = classify(Some(401), "bad credentials");
        assert_eq!(err.error_type, ErrorType::AuthError);
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_classify_generic_tts_error() {
        let err = classify(Some(500), "something broke");
        assert_eq!(err.error_type, ErrorType::TtsError);
    }
}
