//! API request and response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use video_dub_orchestrator::SessionStatus;

/// Dubbing request, shared by the async and sync endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DubRequest {
    /// Source video URL
    pub source_url: String,
    /// Target language name or two-letter code
    pub target_language: String,
    /// `"full"` or a cap in seconds
    #[serde(default = "default_duration")]
    pub duration: String,
}

fn default_duration() -> String {
    "full".to_string()
}

/// Response for an accepted async dubbing request
#[derive(Debug, Clone, Serialize)]
pub struct DubAcceptedResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

/// Response for a completed session's results
#[derive(Debug, Clone, Serialize)]
pub struct DubResultResponse {
    pub session_id: String,
    pub status: SessionStatus,
    /// Stage records keyed by stage name
    pub results: Map<String, Value>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request for the standalone download endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadStageRequest {
    pub source_url: String,
    #[serde(default = "default_duration")]
    pub duration: String,
}

/// Request for the standalone transcribe endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeStageRequest {
    pub audio_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dub_request_duration_defaults_to_full() {
        let request: DubRequest = serde_json::from_str(
            r#"{"source_url": "https://example.com/v", "target_language": "spanish"}"#,
        )
        .unwrap();
        assert_eq!(request.duration, "full");
    }

    #[test]
    fn test_dub_request_with_duration() {
        let request: DubRequest = serde_json::from_str(
            r#"{"source_url": "https://example.com/v", "target_language": "es", "duration": "30"}"#,
        )
        .unwrap();
        assert_eq!(request.duration, "30");
        assert_eq!(request.source_url, "https://example.com/v");
    }

    #[test]
    fn test_dub_request_rejects_unnamed_url_key() {
        let result: Result<DubRequest, _> = serde_json::from_str(
            r#"{"url": "https://example.com/v", "target_language": "es"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_accepted_response_serialization() {
        let response = DubAcceptedResponse {
            session_id: "abc".to_string(),
            status: SessionStatus::Queued,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["status"], "queued");
    }
}
