//! HTTP client for the voice-biometric server
//!
//! One method per endpoint, each decoding into the typed schemas from
//! `protocol`. Audio always travels as a WAV-labeled multipart part. There are
//! no retries: a failed call surfaces immediately as a user-facing message.

use crate::protocol::{
    ErrorResponse, SentenceResponse, SentencesResponse, TrialResponse, VerifyResponse,
};
use crate::session::RecordedTake;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

/// Upload client error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Error connecting to the server")]
    Connection(#[source] reqwest::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response from the server")]
    Decode(#[source] reqwest::Error),
    #[error("Failed to build the upload payload")]
    Payload(#[source] reqwest::Error),
}

/// Client for the enrollment/verification server
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `GET /get-sentences` — the enrollment prompt list
    pub async fn get_sentences(&self) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(self.url("get-sentences"))
            .send()
            .await
            .map_err(ApiError::Connection)?;

        let response = check_status(response, "Failed to fetch sentences").await?;
        let body: SentencesResponse = response.json().await.map_err(ApiError::Decode)?;
        Ok(body.sentences)
    }

    /// `GET /get-sentence` — a single validation prompt
    pub async fn get_sentence(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .get(self.url("get-sentence"))
            .send()
            .await
            .map_err(ApiError::Connection)?;

        let response = check_status(response, "Failed to fetch a sentence").await?;
        let body: SentenceResponse = response.json().await.map_err(ApiError::Decode)?;
        Ok(body.sentence)
    }

    /// `POST /enroll` — the complete batch in one multipart request
    ///
    /// Fields are keyed by position: `audio_{i}` / `sentence_{i}` for each take.
    pub async fn enroll(&self, user_id: &str, takes: &[RecordedTake]) -> Result<(), ApiError> {
        let mut form = Form::new().text("user_id", user_id.to_string());

        for (index, take) in takes.iter().enumerate() {
            let part = wav_part(take.wav.clone(), audio_file_name(index))?;
            form = form
                .part(audio_field_name(index), part)
                .text(sentence_field_name(index), take.sentence.clone());
        }

        let response = self
            .client
            .post(self.url("enroll"))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Connection)?;

        check_status(response, "An error occurred during enrollment").await?;
        Ok(())
    }

    /// `POST /validate_trial` — verify one prompted take against an enrolled
    /// profile; returns true when the server accepts the identity
    pub async fn validate_trial(
        &self,
        speaker_name: &str,
        text: &str,
        wav: Vec<u8>,
    ) -> Result<bool, ApiError> {
        let form = Form::new()
            .text("speaker_name", speaker_name.to_string())
            .text("text", text.to_string())
            .part("trialAudio", wav_part(wav, "validation.wav".to_string())?);

        let response = self
            .client
            .post(self.url("validate_trial"))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Connection)?;

        let response = check_status(response, "An error occurred during validation").await?;
        let body: TrialResponse = response.json().await.map_err(ApiError::Decode)?;
        Ok(body.result.is_verified())
    }

    /// `POST /verify` — free-speech verification; returns the server's message
    pub async fn verify(&self, user_id: &str, wav: Vec<u8>) -> Result<String, ApiError> {
        let form = Form::new()
            .text("user_id", user_id.to_string())
            .part("audio", wav_part(wav, "audio.wav".to_string())?);

        let response = self
            .client
            .post(self.url("verify"))
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::Connection)?;

        let response = check_status(response, "An error occurred during processing").await?;
        let body: VerifyResponse = response.json().await.map_err(ApiError::Decode)?;
        Ok(body
            .message
            .unwrap_or_else(|| "Voice successfully verified!".to_string()))
    }
}

/// Pass 2xx responses through; decode the `error` field of anything else,
/// falling back to a generic message when the body has no usable shape
async fn check_status(
    response: reqwest::Response,
    fallback: &str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message_or(fallback),
        Err(_) => fallback.to_string(),
    };

    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

fn wav_part(wav: Vec<u8>, file_name: String) -> Result<Part, ApiError> {
    Part::bytes(wav)
        .file_name(file_name)
        .mime_str("audio/wav")
        .map_err(ApiError::Payload)
}

fn audio_field_name(index: usize) -> String {
    format!("audio_{}", index)
}

fn audio_file_name(index: usize) -> String {
    format!("audio_{}.wav", index)
}

fn sentence_field_name(index: usize) -> String {
    format!("sentence_{}", index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_field_names_are_keyed_by_index() {
        let audio: Vec<String> = (0..20).map(audio_field_name).collect();
        let sentences: Vec<String> = (0..20).map(sentence_field_name).collect();

        assert_eq!(audio.len(), 20);
        assert_eq!(audio[0], "audio_0");
        assert_eq!(audio[19], "audio_19");
        assert_eq!(sentences[0], "sentence_0");
        assert_eq!(sentences[19], "sentence_19");
        assert_eq!(audio_file_name(7), "audio_7.wav");
    }

    #[test]
    fn test_url_joining_tolerates_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/");
        assert_eq!(client.url("enroll"), "http://localhost:5000/enroll");

        let client = ApiClient::new("http://localhost:5000");
        assert_eq!(client.url("get-sentences"), "http://localhost:5000/get-sentences");
    }

    #[test]
    fn test_server_error_displays_message_verbatim() {
        let err = ApiError::Server {
            status: 400,
            message: "User not found in enrolled profiles".to_string(),
        };
        assert_eq!(err.to_string(), "User not found in enrolled profiles");
        match err {
            ApiError::Server { status, .. } => assert_eq!(status, 400),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_wav_part_accepts_empty_payloads() {
        // Part construction must not fail even for a zero-byte take; the
        // server is the one to reject it
        assert!(wav_part(Vec::new(), audio_file_name(0)).is_ok());
    }
}
