//! Wire types shared by the service adapters.

use serde::{Deserialize, Serialize};

/// One timed segment of a channel transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// A single-channel transcript as returned by the transcription
/// service and stored in blob storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Metadata block of the combined transcript payload. Key spelling is
/// what the sentiment service expects.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMetadata {
    #[serde(rename = "ref-id")]
    pub ref_id: String,
    #[serde(rename = "used-model")]
    pub used_model: String,
    #[serde(rename = "transcribed-at")]
    pub transcribed_at: String,
    #[serde(rename = "company-code")]
    pub company_code: String,
    #[serde(rename = "agent-name")]
    pub agent_name: String,
    #[serde(rename = "source-file")]
    pub source_file: String,
}

/// Both channel transcripts merged into the payload the sentiment
/// service scores against.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedTranscript {
    pub metadata: TranscriptMetadata,
    pub text: String,
    pub segments: Vec<Segment>,
}

impl CombinedTranscript {
    /// Merges two channel transcripts: texts joined with a space,
    /// segment lists concatenated (left first).
    pub fn merge(job_id: &str, filename: &str, left: &Transcript, right: &Transcript) -> Self {
        let mut segments = Vec::with_capacity(left.segments.len() + right.segments.len());
        segments.extend(left.segments.iter().cloned());
        segments.extend(right.segments.iter().cloned());

        Self {
            metadata: TranscriptMetadata {
                ref_id: job_id.to_string(),
                used_model: left
                    .model
                    .clone()
                    .or_else(|| right.model.clone())
                    .unwrap_or_else(|| "large-v3".to_string()),
                transcribed_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                company_code: "AUTO".to_string(),
                agent_name: "System".to_string(),
                source_file: filename.to_string(),
            },
            text: format!("{} {}", left.text, right.text),
            segments,
        }
    }
}

/// One scored segment from the sentiment service.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredSegment {
    #[serde(rename = "segment-id", default)]
    pub segment_id: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    pub sentiment: String,
    #[serde(default = "default_detection_method")]
    pub detection_method: String,
    #[serde(default)]
    pub detection_details: Option<String>,
}

fn default_detection_method() -> String {
    "rule-based".to_string()
}

/// Per-channel audio locations from the split service.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitResult {
    pub left_channel_url: String,
    pub right_channel_url: String,
}
