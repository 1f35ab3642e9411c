//! Classified pipeline errors
//!
//! Every failure that crosses a stage boundary carries the stage that
//! raised it, a coarse category, a human-readable message, and a retry
//! hint. Stages wrap any untyped failure into this shape before returning.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse failure category attached to every stage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// External service rejected the request (rate limit, auth, generic)
    ApiError,
    /// Input value had an unusable shape (e.g. unparseable duration limit)
    FileFormat,
    /// Expected artifact missing on disk
    FileNotFound,
    /// Required input field absent from a stage's input record
    MissingInput,
    /// External model unavailable
    ModelError,
    /// Transport failure talking to an external service
    NetworkError,
    /// External media fetch exited non-zero
    DownloadError,
    /// External process could not be spawned
    SubprocessError,
    /// External service rate limit hit
    RateLimit,
    /// External service rejected credentials
    AuthError,
    /// Speech-to-text failure not otherwise classified
    TranscriptionError,
    /// Requested synthesis voice unavailable
    VoiceError,
    /// Text-to-speech failure not otherwise classified
    TtsError,
    /// Artifact could not be written to disk
    FileCreation,
    /// Remux process exited non-zero
    FfmpegError,
    /// Remux reported success but produced no output file
    OutputNotCreated,
    /// Remux output below the minimal size floor
    OutputTooSmall,
    /// Failure with no more precise classification
    UnexpectedError,
    /// Required credential absent at stage construction
    MissingApiKey,
}

impl ErrorType {
    /// Snake-case name as exposed to API clients
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::FileFormat => "file_format",
            Self::FileNotFound => "file_not_found",
            Self::MissingInput => "missing_input",
            Self::ModelError => "model_error",
            Self::NetworkError => "network_error",
            Self::DownloadError => "download_error",
            Self::SubprocessError => "subprocess_error",
            Self::RateLimit => "rate_limit",
            Self::AuthError => "auth_error",
            Self::TranscriptionError => "transcription_error",
            Self::VoiceError => "voice_error",
            Self::TtsError => "tts_error",
            Self::FileCreation => "file_creation",
            Self::FfmpegError => "ffmpeg_error",
            Self::OutputNotCreated => "output_not_created",
            Self::OutputTooSmall => "output_too_small",
            Self::UnexpectedError => "unexpected_error",
            Self::MissingApiKey => "missing_api_key",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error crossing a stage boundary
#[derive(Debug, Clone, Error, Serialize)]
#[error("{stage}: {error_type} - {message}")]
pub struct PipelineError {
    /// Stage that raised the failure
    pub stage: &'static str,
    /// Coarse category
    pub error_type: ErrorType,
    /// Human-readable detail
    pub message: String,
    /// Whether the caller may safely resubmit the job
    pub retry_possible: bool,
}

impl PipelineError {
    /// Create a classified error. Unknown failures default to retryable;
    /// callers may safely resubmit unless told otherwise.
    pub fn new(stage: &'static str, error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            stage,
            error_type,
            message: message.into(),
            retry_possible: true,
        }
    }

    /// Mark the error as not worth retrying (bad credentials, fatal remux)
    #[must_use]
    pub fn non_retryable(mut self) -> Self {
        self.retry_possible = false;
        self
    }
}

/// Result type for stage operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::new(
            "download",
            ErrorType::DownloadError,
            "Audio download failed: exit code 1",
        );
        assert_eq!(
            err.to_string(),
            "download: download_error - Audio download failed: exit code 1"
        );
    }

    #[test]
    fn test_error_defaults_retryable() {
        let err = PipelineError::new("overlay", ErrorType::UnexpectedError, "boom");
        assert!(err.retry_possible);
    }

    #[test]
    fn test_non_retryable() {
        let err = PipelineError::new("translate", ErrorType::MissingApiKey, "no key")
            .non_retryable();
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_error_type_serialization() {
        let json = serde_json::to_string(&ErrorType::FileNotFound).unwrap();
        assert_eq!(json, "\"file_not_found\"");

        let json = serde_json::to_string(&ErrorType::RateLimit).unwrap();
        assert_eq!(json, "\"rate_limit\"");
    }

    #[test]
    fn test_error_type_matches_as_str() {
        for error_type in [
            ErrorType::ApiError,
            ErrorType::MissingInput,
            ErrorType::OutputTooSmall,
            ErrorType::MissingApiKey,
        ] {
            let json = serde_json::to_string(&error_type).unwrap();
            assert_eq!(json, format!("\"{}\"", error_type.as_str()));
        }
    }

    #[test]
    fn test_error_serializes_classification() {
        let err = PipelineError::new("transcribe", ErrorType::ApiError, "rate limited");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "transcribe");
        assert_eq!(json["error_type"], "api_error");
        assert_eq!(json["retry_possible"], true);
    }
}
