//! Shared test doubles for pipeline integration tests.
//!
//! Every adapter is scriptable through interior mutability: tests set
//! up canned responses and failure counts, run the pipeline, then
//! inspect call logs and recorded events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callscope::db::Database;
use callscope::pipeline::{Adapters, Pipeline, UnitExecutor};
use callscope::queue::DirectQueue;
use callscope::retry::RetryPolicy;
use callscope::services::{
    AudioSplitter, BlobStore, CombinedTranscript, CompetitorDetector, NotificationEvent, Notifier,
    ScoredSegment, Segment, SentimentScorer, ServiceError, SplitResult, TokenProvider, Transcriber,
    Transcript,
};

pub const LEFT_URL: &str = "http://audio/left.mp3";
pub const RIGHT_URL: &str = "http://audio/right.mp3";

fn unavailable(service: &'static str) -> ServiceError {
    ServiceError::Status {
        service,
        status: 503,
        body: "scripted failure".to_string(),
    }
}

pub struct FakeSplitter {
    pub fail: bool,
}

impl AudioSplitter for FakeSplitter {
    fn split(&self, _audio: &[u8], _filename: &str) -> Result<SplitResult, ServiceError> {
        if self.fail {
            return Err(unavailable("split"));
        }
        Ok(SplitResult {
            left_channel_url: LEFT_URL.to_string(),
            right_channel_url: RIGHT_URL.to_string(),
        })
    }
}

pub struct FakeAuth;

impl TokenProvider for FakeAuth {
    fn authenticate(&self) -> Result<String, ServiceError> {
        Ok("test-token".to_string())
    }
}

/// Transcriber keyed by audio URL, with a per-URL failure budget.
#[derive(Default)]
pub struct MockTranscriber {
    transcripts: Mutex<HashMap<String, Transcript>>,
    failures_remaining: Mutex<HashMap<String, u32>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockTranscriber {
    pub fn with_defaults() -> Self {
        let mock = Self::default();
        mock.set_transcript(LEFT_URL, sample_transcript("agent side", 0));
        mock.set_transcript(RIGHT_URL, sample_transcript("customer side", 10));
        mock
    }

    pub fn set_transcript(&self, url: &str, transcript: Transcript) {
        self.transcripts
            .lock()
            .unwrap()
            .insert(url.to_string(), transcript);
    }

    /// The next `count` calls for this URL fail with a 503.
    pub fn fail_next(&self, url: &str, count: u32) {
        self.failures_remaining
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, url: &str, _token: &str) -> Result<Transcript, ServiceError> {
        self.calls.lock().unwrap().push(url.to_string());

        let mut failures = self.failures_remaining.lock().unwrap();
        if let Some(remaining) = failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(unavailable("transcription"));
            }
        }
        drop(failures);

        self.transcripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| unavailable("transcription"))
    }
}

pub struct MockDetector {
    competitors: Vec<String>,
    failures_remaining: Mutex<u32>,
    pub calls: Mutex<u32>,
}

impl MockDetector {
    pub fn returning(names: &[&str]) -> Self {
        Self {
            competitors: names.iter().map(|n| n.to_string()).collect(),
            failures_remaining: Mutex::new(0),
            calls: Mutex::new(0),
        }
    }

    /// The next `count` detection calls fail with a 503.
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }
}

impl CompetitorDetector for MockDetector {
    fn detect(&self, _transcript_text: &str) -> Result<Vec<String>, ServiceError> {
        *self.calls.lock().unwrap() += 1;

        let mut remaining = self.failures_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(unavailable("analysis"));
        }

        Ok(self.competitors.clone())
    }
}

/// Scorer keyed by competitor name, with per-competitor failure
/// budgets and an ordered call log.
#[derive(Default)]
pub struct MockScorer {
    results: Mutex<HashMap<String, Vec<ScoredSegment>>>,
    failures_remaining: Mutex<HashMap<String, u32>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockScorer {
    pub fn set_result(&self, competitor: &str, segments: Vec<ScoredSegment>) {
        self.results
            .lock()
            .unwrap()
            .insert(competitor.to_string(), segments);
    }

    pub fn fail_next(&self, competitor: &str, count: u32) {
        self.failures_remaining
            .lock()
            .unwrap()
            .insert(competitor.to_string(), count);
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SentimentScorer for MockScorer {
    fn score(
        &self,
        competitor: &str,
        _transcript: &CombinedTranscript,
    ) -> Result<Vec<ScoredSegment>, ServiceError> {
        self.calls.lock().unwrap().push(competitor.to_string());

        let mut failures = self.failures_remaining.lock().unwrap();
        if let Some(remaining) = failures.get_mut(competitor) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(unavailable("sentiment"));
            }
        }
        drop(failures);

        Ok(self
            .results
            .lock()
            .unwrap()
            .get(competitor)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryBlobStore {
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, data: &serde_json::Value) -> Result<(), ServiceError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), data.clone());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<serde_json::Value, ServiceError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ServiceError::Status {
                service: "storage",
                status: 404,
                body: format!("no blob at {}", path),
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &NotificationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn sample_transcript(text: &str, first_segment_id: i64) -> Transcript {
    Transcript {
        text: text.to_string(),
        segments: vec![
            Segment {
                id: first_segment_id,
                start: 0.0,
                end: 4.2,
                text: text.to_string(),
            },
            Segment {
                id: first_segment_id + 1,
                start: 4.2,
                end: 9.0,
                text: format!("{} continued", text),
            },
        ],
        model: Some("large-v3".to_string()),
    }
}

pub fn scored_segment(segment_id: &str, text: &str, sentiment: &str) -> ScoredSegment {
    ScoredSegment {
        segment_id: Some(segment_id.to_string()),
        start: Some(1.0),
        end: Some(2.0),
        text: text.to_string(),
        sentiment: sentiment.to_string(),
        detection_method: "llm-based".to_string(),
        detection_details: Some("scripted".to_string()),
    }
}

/// Everything a pipeline test needs in one place.
pub struct Harness {
    pub db: Database,
    pub pipeline: Pipeline,
    pub executor: Arc<UnitExecutor>,
    pub transcriber: Arc<MockTranscriber>,
    pub detector: Arc<MockDetector>,
    pub scorer: Arc<MockScorer>,
    pub blobs: Arc<MemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
}

/// Builds a pipeline over an in-memory database, the given mocks, an
/// inline task queue, and a zero-delay retry policy (three attempts).
pub fn harness(
    splitter: FakeSplitter,
    transcriber: MockTranscriber,
    detector: MockDetector,
    scorer: MockScorer,
) -> Harness {
    let db = Database::open_in_memory().expect("Failed to create test database");
    let transcriber = Arc::new(transcriber);
    let detector = Arc::new(detector);
    let scorer = Arc::new(scorer);
    let blobs = Arc::new(MemoryBlobStore::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let adapters = Adapters {
        auth: Arc::new(FakeAuth),
        transcriber: Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        detector: Arc::clone(&detector) as Arc<dyn CompetitorDetector>,
        scorer: Arc::clone(&scorer) as Arc<dyn SentimentScorer>,
        blobs: Arc::clone(&blobs) as Arc<dyn BlobStore>,
        notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
    };
    let executor = Arc::new(UnitExecutor::new(
        db.clone(),
        adapters,
        RetryPolicy::new(3, Duration::ZERO),
    ));
    let pipeline = Pipeline::new(
        db.clone(),
        Arc::new(splitter),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::new(DirectQueue::new(Arc::clone(&executor))),
    );

    Harness {
        db,
        pipeline,
        executor,
        transcriber,
        detector,
        scorer,
        blobs,
        notifier,
    }
}

pub fn default_harness(competitors: &[&str]) -> Harness {
    harness(
        FakeSplitter { fail: false },
        MockTranscriber::with_defaults(),
        MockDetector::returning(competitors),
        MockScorer::default(),
    )
}
