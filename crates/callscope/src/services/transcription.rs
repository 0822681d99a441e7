//! Transcription client.
//!
//! Downloads the channel audio and posts it to the transcription
//! service with fixed Whisper parameters tuned for call audio. Both
//! transfers share the long per-call timeout.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use super::error::ServiceError;
use super::types::Transcript;
use super::{build_client, read_json, unwrap_array, Transcriber};

const SERVICE: &str = "transcription";

/// Whisper parameters sent with every transcription request.
const WHISPER_PARAMS: &[(&str, &str)] = &[
    ("whisper_model", "large-v3"),
    ("compression_ratio_threshold", "1.8"),
    ("temperature", "0"),
    ("logprob_threshold", "-0.8"),
    ("no_speech_threshold", "0.7"),
    ("condition_on_previous_text", "false"),
    ("beam_size", "1"),
    ("best_of", "1"),
    ("word_timestamps", "true"),
    ("language", "en"),
];

pub struct TranscriptionClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl TranscriptionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }

    fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: format!("audio download from {}", url),
            });
        }

        let bytes = response.bytes().map_err(|e| ServiceError::Network {
            service: SERVICE,
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

impl Transcriber for TranscriptionClient {
    fn transcribe(
        &self,
        channel_audio_url: &str,
        token: &str,
    ) -> Result<Transcript, ServiceError> {
        let audio = self.fetch_audio(channel_audio_url)?;

        let part = Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: format!("failed to build multipart body: {}", e),
            })?;

        let mut form = Form::new().part("audio_file", part);
        for (key, value) in WHISPER_PARAMS {
            form = form.text(*key, *value);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/transcriptions/", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let value = read_json(SERVICE, response)?;
        parse_transcription_response(value)
    }
}

/// The transcription service may answer with the transcript object
/// directly, wrapped in a one-element array, or nested under `data`.
fn parse_transcription_response(value: serde_json::Value) -> Result<Transcript, ServiceError> {
    let mut value = unwrap_array(value);
    if let Some(data) = value.get_mut("data") {
        value = data.take();
    }

    serde_json::from_value(value).map_err(|e| ServiceError::Malformed {
        service: SERVICE,
        reason: e.to_string(),
    })
}
