//! Unit execution.
//!
//! The executor runs one unit at a time: retry wrapping, the unit body
//! itself, and the terminal failure handling its stage prescribes. It
//! never decides ordering; the scheduler does that through the task
//! queue.

use std::sync::Arc;

use tracing::info_span;

use crate::db::{self, job_repo, sentiment_repo, Channel, Database, JobRow, JobStatus};
use crate::retry::RetryPolicy;
use crate::services::{
    BlobStore, CombinedTranscript, CompetitorDetector, NotificationEvent, Notifier, ScoredSegment,
    SentimentScorer, TokenProvider, Transcriber, Transcript,
};

use super::error::UnitError;
use super::graph::Criticality;
use super::unit::{Unit, UnitKind, UnitOutcome};

/// The external collaborators a unit may touch. Trait objects so tests
/// can substitute scripted implementations.
#[derive(Clone)]
pub struct Adapters {
    pub auth: Arc<dyn TokenProvider>,
    pub transcriber: Arc<dyn Transcriber>,
    pub detector: Arc<dyn CompetitorDetector>,
    pub scorer: Arc<dyn SentimentScorer>,
    pub blobs: Arc<dyn BlobStore>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct UnitExecutor {
    db: Database,
    adapters: Adapters,
    retry: RetryPolicy,
}

impl UnitExecutor {
    pub fn new(db: Database, adapters: Adapters, retry: RetryPolicy) -> Self {
        Self {
            db,
            adapters,
            retry,
        }
    }

    /// Runs a unit to its terminal outcome. Attempt failures are
    /// retried per policy; a permanent failure is resolved according
    /// to the stage's criticality before this returns.
    pub fn execute(&self, unit: &Unit) -> UnitOutcome {
        let _span = info_span!("unit", job_id = %unit.job_id, unit = %unit.label()).entered();

        let result = self.retry.run(|attempt| {
            if attempt > 0 {
                log::info!("Re-running {} (attempt {})", unit.label(), attempt + 1);
            }
            self.run_once(unit)
        });

        match result {
            Ok(()) => UnitOutcome::Completed,
            Err(e) => self.resolve_failure(unit, e),
        }
    }

    fn run_once(&self, unit: &Unit) -> Result<(), UnitError> {
        match &unit.kind {
            UnitKind::Transcribe { channel } => self.transcribe(&unit.job_id, *channel),
            UnitKind::DetectCompetitors => self.detect_competitors(&unit.job_id),
            UnitKind::ScoreSentiment { competitor } => {
                self.score_sentiment(&unit.job_id, competitor)
            }
            UnitKind::Finalize => self.finalize(&unit.job_id),
        }
    }

    fn load_job(&self, job_id: &str) -> Result<JobRow, UnitError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| UnitError::State(format!("job '{}' not found", job_id)))
    }

    fn transcribe(&self, job_id: &str, channel: Channel) -> Result<(), UnitError> {
        let job = self.load_job(job_id)?;
        let audio_url = job.channel_url(channel).ok_or_else(|| {
            UnitError::State(format!("job '{}' has no {} channel URL", job_id, channel))
        })?;

        let token = self.adapters.auth.authenticate()?;
        let transcript = self.adapters.transcriber.transcribe(audio_url, &token)?;

        let blob_path = transcript_blob_path(job_id, channel);
        self.adapters
            .blobs
            .put(&blob_path, &serde_json::to_value(&transcript)?)?;

        job_repo::set_transcript_path(&self.db, job_id, channel, &blob_path)?;
        log::info!("Stored {} transcript for job {}", channel, job_id);
        Ok(())
    }

    fn detect_competitors(&self, job_id: &str) -> Result<(), UnitError> {
        let job = self.load_job(job_id)?;
        let (left, right) = self.load_transcripts(&job)?;

        let combined_text = format!("{} {}", left.text, right.text);
        let names = self.adapters.detector.detect(&combined_text)?;
        log::info!("Found {} competitor(s) in job {}", names.len(), job_id);

        job_repo::set_competitors(&self.db, job_id, &names)?;
        Ok(())
    }

    fn score_sentiment(&self, job_id: &str, competitor: &str) -> Result<(), UnitError> {
        let job = self.load_job(job_id)?;
        let (left, right) = self.load_transcripts(&job)?;
        let combined = CombinedTranscript::merge(job_id, &job.filename, &left, &right);

        let segments = self.adapters.scorer.score(competitor, &combined)?;

        if segments.is_empty() {
            // Scoring succeeded but found nothing; record that so the
            // competitor does not look unprocessed. The fixed segment
            // id puts the row under the dedupe index, keeping a
            // re-delivered unit from inserting it twice.
            let row = db::SentimentRow {
                segment_text: String::new(),
                sentiment: "neutral".to_string(),
                detection_method: "none".to_string(),
                detection_details: Some(format!(
                    "no sentiment detected toward {}",
                    competitor
                )),
                segment_id: Some("none".to_string()),
                ..db::SentimentRow::new(job_id, competitor)
            };
            sentiment_repo::insert(&self.db, &row)?;
            return Ok(());
        }

        for segment in &segments {
            let inserted = sentiment_repo::insert(&self.db, &scored_row(job_id, competitor, segment))?;
            if !inserted {
                log::debug!(
                    "Skipped duplicate sentiment row for job {} competitor {} segment {:?}",
                    job_id,
                    competitor,
                    segment.segment_id
                );
            }
        }
        Ok(())
    }

    fn finalize(&self, job_id: &str) -> Result<(), UnitError> {
        job_repo::update_status(&self.db, job_id, JobStatus::Completed, None)?;
        log::info!("Job {} completed", job_id);
        Ok(())
    }

    fn load_transcripts(&self, job: &JobRow) -> Result<(Transcript, Transcript), UnitError> {
        let mut transcripts = Vec::with_capacity(2);
        for channel in Channel::ALL {
            let path = job.transcript_path(channel).ok_or_else(|| {
                UnitError::State(format!(
                    "job '{}' has no {} transcript path",
                    job.id, channel
                ))
            })?;
            let value = self.adapters.blobs.get(path)?;
            transcripts.push(serde_json::from_value::<Transcript>(value)?);
        }
        let right = transcripts.pop().ok_or_else(|| {
            UnitError::State("transcript load produced no results".to_string())
        })?;
        let left = transcripts.pop().ok_or_else(|| {
            UnitError::State("transcript load produced no results".to_string())
        })?;
        Ok((left, right))
    }

    /// Applies the stage's failure policy once retries are exhausted.
    fn resolve_failure(&self, unit: &Unit, error: UnitError) -> UnitOutcome {
        let message = format!(
            "{} failed after {} attempts: {}",
            unit.label(),
            self.retry.max_attempts,
            error
        );
        log::error!("{}", message);

        self.adapters.notifier.notify(&NotificationEvent::UnitFailed {
            unit: unit.label(),
            job_id: unit.job_id.clone(),
            error_message: message.clone(),
        });

        match unit.stage().criticality {
            Criticality::Abort => {
                if let Err(e) = job_repo::update_status(
                    &self.db,
                    &unit.job_id,
                    JobStatus::Failed,
                    Some(&message),
                ) {
                    log::error!("Failed to mark job {} as FAILED: {}", unit.job_id, e);
                }
                UnitOutcome::Aborted { error: message }
            }
            Criticality::Tolerant => {
                if let UnitKind::ScoreSentiment { competitor } = &unit.kind {
                    let row = db::SentimentRow {
                        sentiment: "error".to_string(),
                        detection_method: "none".to_string(),
                        detection_details: Some(message.clone()),
                        ..db::SentimentRow::new(&unit.job_id, competitor)
                    };
                    if let Err(e) = sentiment_repo::insert(&self.db, &row) {
                        log::error!(
                            "Failed to record scoring failure for job {}: {}",
                            unit.job_id,
                            e
                        );
                    }
                }
                UnitOutcome::Tolerated { error: message }
            }
        }
    }
}

/// Canonical blob path for a channel transcript.
pub fn transcript_blob_path(job_id: &str, channel: Channel) -> String {
    format!("transcripts/{}/{}_transcript.json", job_id, channel)
}

fn scored_row(job_id: &str, competitor: &str, segment: &ScoredSegment) -> db::SentimentRow {
    db::SentimentRow {
        segment_text: segment.text.clone(),
        sentiment: segment.sentiment.clone(),
        detection_method: segment.detection_method.clone(),
        detection_details: segment.detection_details.clone(),
        segment_id: segment.segment_id.clone(),
        start_time: segment.start.map(|s| s.to_string()),
        end_time: segment.end.map(|e| e.to_string()),
        ..db::SentimentRow::new(job_id, competitor)
    }
}
