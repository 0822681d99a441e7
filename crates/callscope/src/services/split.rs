//! Audio split client.
//!
//! Uploads a stereo recording and receives one audio URL per channel.
//! Relative URLs in the response are resolved against the split
//! service base.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use super::error::ServiceError;
use super::types::SplitResult;
use super::{build_client, read_json, unwrap_array, AudioSplitter};

const SERVICE: &str = "split";

pub struct SplitClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl SplitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }
}

impl AudioSplitter for SplitClient {
    fn split(&self, audio: &[u8], filename: &str) -> Result<SplitResult, ServiceError> {
        let part = Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: format!("failed to build multipart body: {}", e),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/split", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let value = unwrap_array(read_json(SERVICE, response)?);
        let mut result: SplitResult =
            serde_json::from_value(value).map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: e.to_string(),
            })?;

        result.left_channel_url = resolve_url(&self.base_url, &result.left_channel_url);
        result.right_channel_url = resolve_url(&self.base_url, &result.right_channel_url);
        Ok(result)
    }
}

/// Prepends the service base when the split service hands back a
/// relative path instead of a full URL.
fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}
