//! Translate stage
//!
//! Converts the transcript to the target language through the Anthropic
//! messages API. Exactly one request per call: no chunking, no retries.
//! The instruction asks for translated text only; if the model prepends
//! commentary anyway, the caller receives it uncorrected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use video_dub_common::{ErrorType, PipelineError, Stage};
use video_dub_transcribe::TranscribeOutput;

/// Stage name used in errors and result keys
pub const STAGE_NAME: &str = "translate";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-haiku-20240307";
const MAX_TOKENS: u32 = 2000;

/// Input record for the translate stage
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub transcription: TranscribeOutput,
    pub target_language: String,
}

/// Output record for the translate stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateOutput {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub original_text: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Build the single translation instruction sent to the model: preserve
/// conversational tone and comparable length, return translated text only.
#[must_use]
pub fn translation_prompt(text: &str, target_language: &str, source_language: &str) -> String {
    format!(
        "Translate this {source_language} text to {target_language}. Preserve the natural \
         speaking style and conversational tone. Keep the translation length similar to the \
         original. Return only the translated text with no additional commentary.\n\n{text}"
    )
}

/// Map a failed translation call onto the error taxonomy
fn classify(status: Option<u16>, detail: &str) -> PipelineError {
    let lower = detail.to_lowercase();
    if status == Some(429) || lower.contains("rate limit") {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::RateLimit,
            format!("Translation API rate limit exceeded: {detail}"),
        )
    } else if matches!(status, Some(401 | 403))
        || lower.contains("api key")
        || lower.contains("authentication")
    {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::AuthError,
            format!("Authentication failed: {detail}"),
        )
        .non_retryable()
    } else if lower.contains("model") {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::ModelError,
            format!("Model unavailable: {detail}"),
        )
    } else {
        PipelineError::new(
            STAGE_NAME,
            ErrorType::ApiError,
            format!("Translation API error: {detail}"),
        )
    }
}

/// Translates transcripts via the external text-generation service
#[derive(Debug)]
pub struct TranslateStage {
    api_key: String,
    client: reqwest::Client,
}

impl TranslateStage {
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
                "ANTHROPIC_API_KEY not found in environment",
            )
            .non_retryable());
        }
        Ok(Self {
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// Create the stage from `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::new(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
    }
}

#[async_trait]
impl Stage for TranslateStage {
    type Input = TranslateRequest;
    type Output = TranslateOutput;

    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(&self, request: TranslateRequest) -> Result<TranslateOutput, PipelineError> {
        let source_text = request.transcription.text;
        let source_language = request.transcription.detected_language;
        let target_language = request.target_language;

        info!(
            "Translating {} chars from {} to {}",
            source_text.len(),
            source_language,
            target_language
        );

        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: translation_prompt(&source_text, &target_language, &source_language),
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                PipelineError::new(
                    STAGE_NAME,
                    ErrorType::NetworkError,
                    format!("Translation request failed: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify(Some(status.as_u16()), &detail));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| classify(None, &format!("unexpected response shape: {e}")))?;

        let translated_text = parsed
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| classify(None, "empty response content"))?;

        info!(
            "Completed translation: {} chars to {} chars",
            source_text.len(),
            translated_text.len()
        );

        Ok(TranslateOutput {
            translated_text,
            source_language,
            target_language,
            original_text: source_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected_at_construction() {
        let err = TranslateStage::new("").unwrap_err();
        assert_eq!(err.error_type, ErrorType::MissingApiKey);
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_prompt_embeds_languages_and_text() {
        let prompt = translation_prompt("hello there", "spanish", "english");
        assert!(prompt.contains("english text to spanish"));
        assert!(prompt.contains("no additional commentary"));
        assert!(prompt.ends_with("hello there"));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify(Some(429), "slow down");
        assert_eq!(err.error_type, ErrorType::RateLimit);
        assert!(err.retry_possible);
    }

    #[test]
    fn test_classify_rate_limit_by_keyword() {
        let err = classify(Some(500), "rate limit exceeded");
        assert_eq!(err.error_type, ErrorType::RateLimit);
    }

    #[test]
    fn test_classify_auth_error_not_retryable() {
        let err = classify(Some(401), "invalid x-api-key");
        assert_eq!(err.error_type, ErrorType::AuthError);
        assert!(!err.retry_possible);
    }

    #[test]
    fn test_classify_model_error() {
        let err = classify(Some(404), "model not found");
        assert_eq!(err.error_type, ErrorType::ModelError);
    }

    #[test]
    fn test_classify_generic_api_error() {
        let err = classify(Some(500), "overloaded");
        assert_eq!(err.error_type, ErrorType::ApiError);
    }

    #[test]
    fn test_response_parsing() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "hola"}], "stop_reason": "end_turn"}"#,
        )
        .unwrap();
        assert_eq!(parsed.content[0].text, "hola");
    }
}
