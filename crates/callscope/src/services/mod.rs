//! External service adapters.
//!
//! Each collaborator is a narrow trait with one blocking operation and
//! an HTTP implementation carrying its own timeout. The pipeline only
//! ever consumes the traits; protocol quirks (array-wrapped bodies,
//! nested `data` envelopes) stay inside this module.

pub mod analysis;
pub mod auth;
pub mod error;
pub mod notify;
pub mod sentiment;
pub mod split;
pub mod storage;
pub mod transcription;
pub mod types;

pub use analysis::AnalysisClient;
pub use auth::AuthClient;
pub use error::ServiceError;
pub use notify::{HttpNotifier, NoopNotifier, NotificationEvent};
pub use sentiment::SentimentClient;
pub use split::SplitClient;
pub use storage::StorageClient;
pub use transcription::TranscriptionClient;
pub use types::{CombinedTranscript, ScoredSegment, Segment, SplitResult, Transcript};

/// Issues a bearer token for services that require authentication.
/// Implementations retry internally; callers see only the final
/// outcome.
pub trait TokenProvider: Send + Sync {
    fn authenticate(&self) -> Result<String, ServiceError>;
}

/// Splits an uploaded recording into per-channel audio files.
pub trait AudioSplitter: Send + Sync {
    fn split(&self, audio: &[u8], filename: &str) -> Result<SplitResult, ServiceError>;
}

/// Transcribes one audio channel addressed by URL.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, channel_audio_url: &str, token: &str)
        -> Result<Transcript, ServiceError>;
}

/// Finds competitor mentions in transcript text.
pub trait CompetitorDetector: Send + Sync {
    fn detect(&self, transcript_text: &str) -> Result<Vec<String>, ServiceError>;
}

/// Scores sentiment toward one competitor over the combined
/// transcript. An empty result means no sentiment was detected.
pub trait SentimentScorer: Send + Sync {
    fn score(
        &self,
        competitor: &str,
        transcript: &CombinedTranscript,
    ) -> Result<Vec<ScoredSegment>, ServiceError>;
}

/// JSON blob storage for transcripts.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, data: &serde_json::Value) -> Result<(), ServiceError>;
    fn get(&self, path: &str) -> Result<serde_json::Value, ServiceError>;
}

/// Fire-and-forget failure reporting. Implementations must swallow
/// their own errors; notification failure never propagates into
/// pipeline failure handling.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &NotificationEvent);
}

/// Maximum length for error bodies carried into error values, to keep
/// logs readable.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Reads a JSON body from a blocking response, converting non-2xx
/// statuses and undecodable bodies into classified errors.
pub(crate) fn read_json(
    service: &'static str,
    response: reqwest::blocking::Response,
) -> Result<serde_json::Value, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ServiceError::Status {
            service,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    response.json().map_err(|e| ServiceError::Malformed {
        service,
        reason: e.to_string(),
    })
}

/// Checks a response status without reading a body.
pub(crate) fn check_status(
    service: &'static str,
    response: reqwest::blocking::Response,
) -> Result<(), ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ServiceError::Status {
            service,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    Ok(())
}

/// Several upstream services wrap their payload in a one-element
/// array. Unwraps that form; returns the value unchanged otherwise.
pub(crate) fn unwrap_array(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Builds a blocking HTTP client with the given timeout.
pub(crate) fn build_client(
    service: &'static str,
    timeout: std::time::Duration,
) -> Result<reqwest::blocking::Client, ServiceError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Config {
            service,
            reason: format!("failed to build HTTP client: {}", e),
        })
}
