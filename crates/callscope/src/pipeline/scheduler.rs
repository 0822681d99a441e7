//! Job scheduling.
//!
//! `Pipeline` owns a job from admission to its terminal status. It
//! walks the stage graph in order, hands each stage's units to the
//! task queue, and stops at the first aborting failure. All durable
//! state lives in the database; the scheduler itself is stateless
//! between calls.

use std::sync::Arc;

use tracing::info_span;

use crate::config::Config;
use crate::db::{job_repo, sentiment_repo, Channel, Database, JobRow, JobStatus};
use crate::queue::{TaskQueue, WorkerPool};
use crate::services::{
    AnalysisClient, AudioSplitter, AuthClient, HttpNotifier, NoopNotifier, NotificationEvent,
    Notifier, SentimentClient, SplitClient, StorageClient, TranscriptionClient,
};

use super::executor::{Adapters, UnitExecutor};
use super::graph::{Dispatch, STAGES};
use super::unit::{Unit, UnitKind, UnitOutcome};
use super::PipelineError;

pub struct Pipeline {
    db: Database,
    splitter: Arc<dyn AudioSplitter>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn TaskQueue>,
    pool: Option<Arc<WorkerPool>>,
}

/// Summary of one pipeline run, for callers and logs.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub job_id: String,
    pub status: JobStatus,
    pub competitors_found: Vec<String>,
    pub sentiment_rows: u64,
    /// Labels of units that failed permanently on a tolerant stage.
    pub tolerated_failures: Vec<String>,
}

impl Pipeline {
    /// Production constructor: HTTP adapters for every service and a
    /// thread pool sized from the config.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, PipelineError> {
        let services = &config.services;
        let timeouts = &config.timeouts;
        let secs = std::time::Duration::from_secs;

        let auth = AuthClient::new(
            &services.auth_url,
            &services.auth_username,
            &services.auth_password,
            secs(timeouts.auth_secs),
            config.retry.auth_policy(),
        )?;
        let splitter = SplitClient::new(&services.split_url, secs(timeouts.split_secs))?;
        let transcriber =
            TranscriptionClient::new(&services.transcription_url, secs(timeouts.transcription_secs))?;
        let detector = AnalysisClient::new(&services.analysis_url, secs(timeouts.analysis_secs))?;
        let scorer = SentimentClient::new(&services.sentiment_url, secs(timeouts.sentiment_secs))?;
        let blobs = StorageClient::new(&services.storage_url, secs(timeouts.storage_secs))?;

        let notifier: Arc<dyn Notifier> = match &services.notification_url {
            Some(url) => Arc::new(HttpNotifier::new(url, secs(timeouts.notification_secs))?),
            None => Arc::new(NoopNotifier),
        };

        let adapters = Adapters {
            auth: Arc::new(auth),
            transcriber: Arc::new(transcriber),
            detector: Arc::new(detector),
            scorer: Arc::new(scorer),
            blobs: Arc::new(blobs),
            notifier: Arc::clone(&notifier),
        };
        let executor = Arc::new(UnitExecutor::new(
            db.clone(),
            adapters,
            config.retry.stage_policy(),
        ));
        let pool = Arc::new(WorkerPool::new(executor, config.workers));

        Ok(Self {
            db,
            splitter: Arc::new(splitter),
            notifier,
            queue: Arc::clone(&pool) as Arc<dyn TaskQueue>,
            pool: Some(pool),
        })
    }

    /// Constructor with injected collaborators.
    pub fn new(
        db: Database,
        splitter: Arc<dyn AudioSplitter>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            db,
            splitter,
            notifier,
            queue,
            pool: None,
        }
    }

    /// Creates the PENDING job row for an uploaded recording.
    pub fn submit(&self, filename: &str) -> Result<JobRow, PipelineError> {
        let job = job_repo::create(&self.db, filename)?;
        log::info!("Created job {} for {}", job.id, filename);
        Ok(job)
    }

    /// Splits the recording into channel audio and moves the job to
    /// PROCESSING. A split failure fails the job immediately: without
    /// channel audio there is nothing to retry against later.
    pub fn admit(&self, job_id: &str, audio: &[u8]) -> Result<(), PipelineError> {
        let job = self.load(job_id)?;
        self.guard_status(&job, JobStatus::Pending)?;

        let _span = info_span!("admit", job_id = %job_id, filename = %job.filename).entered();

        let split = match self.splitter.split(audio, &job.filename) {
            Ok(split) => split,
            Err(e) => {
                let message = format!("audio split failed: {}", e);
                job_repo::update_status(&self.db, job_id, JobStatus::Failed, Some(&message))?;
                self.notifier.notify(&NotificationEvent::JobFailed {
                    job_id: job_id.to_string(),
                    filename: job.filename.clone(),
                    error_message: message,
                });
                return Err(PipelineError::Service(e));
            }
        };

        job_repo::set_channel_urls(
            &self.db,
            job_id,
            &split.left_channel_url,
            &split.right_channel_url,
        )?;
        job_repo::update_status(&self.db, job_id, JobStatus::Processing, None)?;
        log::info!("Job {} admitted for processing", job_id);
        Ok(())
    }

    /// Runs the stage graph to a terminal job status. A FAILED job is
    /// a legitimate report, not an error; errors are reserved for the
    /// scheduler's own problems (bad state, dead queue, database).
    pub fn start(&self, job_id: &str) -> Result<PipelineReport, PipelineError> {
        let job = self.load(job_id)?;
        self.guard_status(&job, JobStatus::Processing)?;
        if job.left_channel_url.is_none() || job.right_channel_url.is_none() {
            return Err(PipelineError::MissingChannels(job_id.to_string()));
        }

        let _span = info_span!("pipeline", job_id = %job_id, filename = %job.filename).entered();
        let mut tolerated = Vec::new();

        for stage in &STAGES {
            let _stage_span = info_span!("stage", name = stage.name).entered();

            let units = self.stage_units(stage.name, job_id)?;
            if units.is_empty() {
                log::info!(
                    "No units for stage {} on job {}, continuing",
                    stage.name,
                    job_id
                );
                continue;
            }

            let outcomes = match stage.dispatch {
                Dispatch::Parallel => self.queue.dispatch(units)?,
                Dispatch::Serial => {
                    let mut all = Vec::with_capacity(units.len());
                    for unit in units {
                        let mut batch = self.queue.dispatch(vec![unit])?;
                        let aborted = batch.iter().any(|(_, o)| o.is_abort());
                        all.append(&mut batch);
                        if aborted {
                            break;
                        }
                    }
                    all
                }
            };

            for (unit, outcome) in outcomes {
                match outcome {
                    UnitOutcome::Completed => {}
                    UnitOutcome::Tolerated { .. } => tolerated.push(unit.label()),
                    UnitOutcome::Aborted { error } => {
                        // The executor already marked the job FAILED.
                        self.notifier.notify(&NotificationEvent::JobFailed {
                            job_id: job_id.to_string(),
                            filename: job.filename.clone(),
                            error_message: error,
                        });
                        return self.report(job_id, tolerated);
                    }
                }
            }
        }

        self.report(job_id, tolerated)
    }

    /// Convenience wrapper: submit, admit, and run in one call.
    pub fn process(&self, filename: &str, audio: &[u8]) -> Result<PipelineReport, PipelineError> {
        let job = self.submit(filename)?;
        self.admit(&job.id, audio)?;
        self.start(&job.id)
    }

    /// Stops the owned worker pool, if any, and waits for its threads.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown();
            pool.wait();
        }
    }

    fn stage_units(&self, stage_name: &str, job_id: &str) -> Result<Vec<Unit>, PipelineError> {
        let units = match stage_name {
            "transcribe" => Channel::ALL
                .iter()
                .map(|&channel| Unit::new(job_id, UnitKind::Transcribe { channel }))
                .collect(),
            "detect_competitors" => vec![Unit::new(job_id, UnitKind::DetectCompetitors)],
            "score_sentiment" => {
                // The competitor list only exists after detection ran.
                let job = self.load(job_id)?;
                job.competitors_found
                    .iter()
                    .map(|name| {
                        Unit::new(
                            job_id,
                            UnitKind::ScoreSentiment {
                                competitor: name.clone(),
                            },
                        )
                    })
                    .collect()
            }
            "finalize" => vec![Unit::new(job_id, UnitKind::Finalize)],
            _ => Vec::new(),
        };
        Ok(units)
    }

    fn load(&self, job_id: &str) -> Result<JobRow, PipelineError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    fn guard_status(&self, job: &JobRow, expected: JobStatus) -> Result<(), PipelineError> {
        if job.status != expected {
            return Err(PipelineError::InvalidState {
                job_id: job.id.clone(),
                status: job.status,
                expected,
            });
        }
        Ok(())
    }

    fn report(
        &self,
        job_id: &str,
        tolerated_failures: Vec<String>,
    ) -> Result<PipelineReport, PipelineError> {
        let job = self.load(job_id)?;
        let sentiment_rows = sentiment_repo::count_by_job(&self.db, job_id)?;
        Ok(PipelineReport {
            job_id: job.id,
            status: job.status,
            competitors_found: job.competitors_found,
            sentiment_rows,
            tolerated_failures,
        })
    }
}
