//! Transcribe stage
//!
//! Converts a session's source audio to text with detected language via
//! the ElevenLabs speech-to-text API. One request per file, no retries;
//! retry policy belongs to the caller.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use video_dub_common::{ErrorType, PipelineError, Stage};

/// Stage name used in errors and result keys
pub const STAGE_NAME: &str = "transcribe";

const SPEECH_TO_TEXT_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";
const MODEL_ID: &str = "scribe_v1";

/// Language reported when the service does not detect one
const DEFAULT_LANGUAGE: &str = "en";

/// One speaker turn. Not populated yet; diarization is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Output record for the transcribe stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeOutput {
    pub text: String,
    pub detected_language: String,
    pub utterances: Vec<Utterance>,
    pub has_multiple_speakers: bool,
}

#[derive(Debug, Deserialize)]
struct SpeechToTextResponse {
    text: String,
    #[serde(default)]
    language_code: Option<String>,
}

/// Transcribes session audio via the external speech-to-text service
#[derive(Debug)]
pub struct TranscribeStage {
    api_key: String,
    client: reqwest::Client,
}

impl TranscribeStage {
    /// Create the stage with an explicit API key.
    ///
    /// # Errors
    ///
    /// Fails fast with `missing_api_key` (non-retryable) on an empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, PipelineError> {
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
        })
    }

    /// Create the stage from `ELEVENLABS_API_KEY`
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::new(std::env::var("ELEVENLABS_API_KEY").unwrap_or_default())
    }
}

/// Map a failed speech-to-text call onto the error taxonomy.
///
/// Rate-limit and auth rejections are `api_error`; anything else is a
/// generic `transcription_error`.
fn classify(status: Option<u16>, detail: &str) -> PipelineError {
    let lower = detail.to_lowercase();
    let looks_like_api_failure = matches!(status, Some(429 | 401 | 403))
        || lower.contains("rate")
        || lower.contains("api");
    if looks_like_api_failure {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::ApiError,
            format!("Speech-to-text API error: {detail}"),
        )
    } else {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::TranscriptionError,
            format!("Transcription failed: {detail}"),
        )
    }
}

#[async_trait]
impl Stage for TranscribeStage {
    type Input = PathBuf;
    type Output = TranscribeOutput;

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(&self, audio_path: PathBuf) -> Result<TranscribeOutput, PipelineError> {
        info!("Transcribing audio file: {}", audio_path.display());

        let bytes = tokio::fs::read(&audio_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::FileNotFound,
                    format!("Audio file not found: {}", audio_path.display()),
                )
            } else {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::TranscriptionError,
                    format!("Cannot read audio file {}: {e}", audio_path.display()),
                )
            }
        })?;

        let file_name = audio_path
            .file_name()
            .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());
        let form = reqwest::multipart::Form::new()
            .text("model_id", MODEL_ID)
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(SPEECH_TO_TEXT_URL)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::NetworkError,
                    format!("Speech-to-text request failed: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(Some(status.as_u16()), &body));
        }

        let parsed: SpeechToTextResponse = response
            .json()
            .await
            .map_err(|e| classify(None, &format!("unexpected response shape: {e}")))?;

        let detected_language = parsed
            .language_code
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        info!(
            "Completed transcription: {} chars, language {}",
            parsed.text.len(),
            detected_language
        );

        Ok(TranscribeOutput {
            text: parsed.text,
            detected_language,
            utterances: Vec::new(),
            has_multiple_speakers: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected_at_construction() {
        let err = TranscribeStage::new("").unwrap_err();
        assert_eq!(err.error_type, ErrorType::MissingApiKey);
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_valid_key_accepted() {
        assert!(TranscribeStage::new("test_key").is_ok());
    }

    #[test]
    fn test_classify_rate_limit_as_api_error() {
        let err = classify(Some(429), "too many requests");
        assert_eq!(err.error_type, ErrorType::ApiError);
    }

    #[test]
    fn test_classify_auth_as_api_error() {
        let err = classify(Some(401), "invalid key");
        assert_eq!(err.error_type, ErrorType::ApiError);
    }

    #[test]
    fn test_classify_keyword_hint() {
        let err = classify(Some(500), "rate limit exceeded, slow down");
        assert_eq!(err.error_type, ErrorType::ApiError);
    }

    #[test]
    fn test_classify_generic_failure() {
        let err = classify(Some(500), "internal failure");
        assert_eq!(err.error_type, ErrorType::TranscriptionError);
        assert_eq!(err.stage, STAGE_NAME);
    }

    #[test]
    fn test_response_parsing() {
        let parsed: SpeechToTextResponse =
            serde_json::from_str(r#"{"text": "hola mundo", "language_code": "es"}"#).unwrap();
        assert_eq!(parsed.text, "hola mundo");
        assert_eq!(parsed.language_code.as_deref(), Some("es"));
    }

    #[test]
    fn test_response_parsing_without_language() {
        let parsed: SpeechToTextResponse = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert!(parsed.language_code.is_none());
    }

    #[tokio::test]
    async fn test_missing_audio_file() {
        let stage = TranscribeStage::new("test_key").unwrap();
        let err = stage
            .process(PathBuf::from("/nonexistent/audio.wav"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ErrorType::FileNotFound);
        assert!(err.message.contains("Audio file not found"));
    }
}
