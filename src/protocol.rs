//! Wire schemas for the voice-biometric server
//!
//! Every endpoint gets an explicit serde schema so a shape mismatch fails at
//! decode time instead of surfacing as a missing-field panic later.

use serde::Deserialize;

/// Prompt used when the sentence fetch fails and the flow can proceed anyway
pub const FALLBACK_SENTENCE: &str = "The quick brown fox jumps over the lazy dog.";

/// `GET /get-sentences` — enrollment prompt list
#[derive(Deserialize, Debug, Clone)]
pub struct SentencesResponse {
    #[serde(default)]
    pub sentences: Vec<String>,
}

/// `GET /get-sentence` — single validation prompt
#[derive(Deserialize, Debug, Clone)]
pub struct SentenceResponse {
    pub sentence: String,
}

/// Body of any non-2xx response
#[derive(Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Server message with a generic fallback when the field is absent
    pub fn message_or(self, fallback: &str) -> String {
        self.error.unwrap_or_else(|| fallback.to_string())
    }
}

/// `POST /validate_trial` — verification outcome
#[derive(Deserialize, Debug, Clone)]
pub struct TrialResponse {
    pub result: TrialResult,
}

/// The server has emitted `result` as a string, a number, and a bool across
/// versions; accept all three and pin the contract to a boolean here.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TrialResult {
    Flag(bool),
    Number(i64),
    Text(String),
}

impl TrialResult {
    /// Non-zero means verified
    pub fn is_verified(&self) -> bool {
        match self {
            TrialResult::Flag(flag) => *flag,
            TrialResult::Number(n) => *n != 0,
            TrialResult::Text(text) => matches!(text.trim().parse::<i64>(), Ok(n) if n != 0),
        }
    }
}

/// `POST /verify` — alternate flow success body
#[derive(Deserialize, Debug, Clone)]
pub struct VerifyResponse {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_result_string_one_is_verified() {
        let response: TrialResponse = serde_json::from_str(r#"{"result": "1"}"#).unwrap();
        assert!(response.result.is_verified());
    }

    #[test]
    fn test_trial_result_string_zero_is_rejected() {
        let response: TrialResponse = serde_json::from_str(r#"{"result": "0"}"#).unwrap();
        assert!(!response.result.is_verified());
    }

    #[test]
    fn test_trial_result_numeric_forms() {
        let one: TrialResponse = serde_json::from_str(r#"{"result": 1}"#).unwrap();
        assert!(one.result.is_verified());

        let zero: TrialResponse = serde_json::from_str(r#"{"result": 0}"#).unwrap();
        assert!(!zero.result.is_verified());
    }

    #[test]
    fn test_trial_result_bool_form() {
        let response: TrialResponse = serde_json::from_str(r#"{"result": true}"#).unwrap();
        assert!(response.result.is_verified());
    }

    #[test]
    fn test_trial_result_garbage_text_is_rejected() {
        let response: TrialResponse = serde_json::from_str(r#"{"result": "maybe"}"#).unwrap();
        assert!(!response.result.is_verified());
    }

    #[test]
    fn test_trial_result_missing_field_fails_decode() {
        let decoded = serde_json::from_str::<TrialResponse>(r#"{"verdict": "1"}"#);
        assert!(decoded.is_err());
    }

    #[test]
    fn test_sentences_response_defaults_to_empty() {
        let response: SentencesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.sentences.is_empty());
    }

    #[test]
    fn test_error_response_fallback_message() {
        let with_field: ErrorResponse =
            serde_json::from_str(r#"{"error": "user not enrolled"}"#).unwrap();
        assert_eq!(with_field.message_or("generic"), "user not enrolled");

        let without_field: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(without_field.message_or("generic"), "generic");
    }
}
