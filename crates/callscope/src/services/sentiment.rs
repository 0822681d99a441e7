//! Sentiment scoring client.
//!
//! Posts a context prompt and the combined transcript as multipart
//! files. The response is a list of scored segments; an empty list
//! means no sentiment toward the competitor was detected.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use super::error::ServiceError;
use super::types::{CombinedTranscript, ScoredSegment};
use super::{build_client, read_json, SentimentScorer};

const SERVICE: &str = "sentiment";

pub struct SentimentClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }
}

impl SentimentScorer for SentimentClient {
    fn score(
        &self,
        competitor: &str,
        transcript: &CombinedTranscript,
    ) -> Result<Vec<ScoredSegment>, ServiceError> {
        let transcript_json =
            serde_json::to_vec(transcript).map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: format!("failed to serialize transcript payload: {}", e),
            })?;

        let context_part = Part::text(format!("Analyze sentiment regarding: {}", competitor))
            .file_name("context.txt")
            .mime_str("text/plain")
            .map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: format!("failed to build multipart body: {}", e),
            })?;
        let transcript_part = Part::bytes(transcript_json)
            .file_name("transcript.json")
            .mime_str("application/json")
            .map_err(|e| ServiceError::Malformed {
                service: SERVICE,
                reason: format!("failed to build multipart body: {}", e),
            })?;

        let form = Form::new()
            .part("context", context_part)
            .part("transcript", transcript_part);

        let response = self
            .http
            .post(format!("{}/analyze/contextual/file", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let value = read_json(SERVICE, response)?;
        parse_sentiment_response(value)
    }
}

fn parse_sentiment_response(
    value: serde_json::Value,
) -> Result<Vec<ScoredSegment>, ServiceError> {
    serde_json::from_value(value).map_err(|e| ServiceError::Malformed {
        service: SERVICE,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scored_segments() {
        let segments = parse_sentiment_response(json!([
            {
                "segment-id": "3",
                "start": 42.0,
                "end": 47.5,
                "text": "their support never picks up",
                "sentiment": "negative",
                "detection_method": "llm-based",
                "detection_details": "frustration with support"
            }
        ]))
        .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].sentiment, "negative");
        assert_eq!(segments[0].segment_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_empty_list_means_no_sentiment() {
        let segments = parse_sentiment_response(json!([])).unwrap();
        assert!(segments.is_empty());
    }

    #[test]
    fn test_parse_non_array_is_malformed() {
        let err = parse_sentiment_response(json!({"sentiment": "positive"})).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { .. }));
    }
}
