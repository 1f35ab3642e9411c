//! Language to voice selection policy
//!
//! Resolving a synthesis voice never fails: normalize the language string,
//! try the fixed language-name table, expand common two-letter codes and
//! retry, and finally fall back to one default voice.

use tracing::warn;

/// Rachel: reliable default, works well with the multilingual model
pub const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// Sarah
const VOICE_SARAH: &str = "EXAVITQu4vr4xnSDxMaL";
/// Laura
const VOICE_LAURA: &str = "FGY2WhTYpPnrIDTdsKH5";

fn voice_for_language(language: &str) -> Option<&'static str> {
    match language {
        "english" | "spanish" | "italian" | "portuguese" => Some(DEFAULT_VOICE),
        "french" | "turkish" | "dutch" | "japanese" | "chinese" | "korean" | "hindi"
        | "arabic" => Some(VOICE_SARAH),
        "german" | "polish" | "russian" | "swedish" | "norwegian" | "danish" | "finnish" => {
            Some(VOICE_LAURA)
        }
        _ => None,
    }
}

fn expand_language_code(code: &str) -> Option<&'static str> {
    match code {
        "en" => Some("english"),
        "es" => Some("spanish"),
        "fr" => Some("french"),
        "de" => Some("german"),
        "it" => Some("italian"),
        "pt" => Some("portuguese"),
        "pl" => Some("polish"),
        "tr" => Some("turkish"),
        "ru" => Some("russian"),
        "nl" => Some("dutch"),
        "sv" => Some("swedish"),
        "no" => Some("norwegian"),
        "da" => Some("danish"),
        "fi" => Some("finnish"),
        "ja" => Some("japanese"),
        "zh" => Some("chinese"),
        "ko" => Some("korean"),
        "hi" => Some("hindi"),
        "ar" => Some("arabic"),
        _ => None,
    }
}

/// Resolve a synthesis voice for a language string.
///
/// Pure function of its input: case- and whitespace-insensitive, accepts
/// two-letter codes as well as full names, and always resolves — an
/// unrecognized language gets the default voice with a warning.
#[must_use]
pub fn select_voice(language: &str) -> &'static str {
    let normalized = language.trim().to_lowercase();

    if let Some(voice) = voice_for_language(&normalized) {
        return voice;
    }
    if let Some(name) = expand_language_code(&normalized) {
        if let Some(voice) = voice_for_language(name) {
            return voice;
        }
    }

    warn!("No voice mapping for language '{language}', using default voice");
    DEFAULT_VOICE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_name_resolve_identically() {
        assert_eq!(select_voice("spanish"), select_voice("es"));
        assert_eq!(select_voice("german"), select_voice("de"));
        assert_eq!(select_voice("japanese"), select_voice("ja"));
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(select_voice("Spanish "), select_voice("spanish"));
        assert_eq!(select_voice("  FRENCH"), select_voice("french"));
        assert_eq!(select_voice("ES"), select_voice("es"));
    }

    #[test]
    fn test_unrecognized_language_falls_back() {
        assert_eq!(select_voice("klingon"), DEFAULT_VOICE);
        assert_eq!(select_voice(""), DEFAULT_VOICE);
        assert_eq!(select_voice("xx"), DEFAULT_VOICE);
    }

    #[test]
    fn test_known_mappings() {
        assert_eq!(select_voice("english"), DEFAULT_VOICE);
        assert_eq!(select_voice("french"), VOICE_SARAH);
        assert_eq!(select_voice("german"), VOICE_LAURA);
        assert_eq!(select_voice("russian"), VOICE_LAURA);
        assert_eq!(select_voice("arabic"), VOICE_SARAH);
    }
}
