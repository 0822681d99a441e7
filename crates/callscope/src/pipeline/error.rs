use thiserror::Error;

use crate::db::{DatabaseError, JobStatus};
use crate::error::WorkerError;
use crate::retry::Retryable;
use crate::services::ServiceError;

/// Errors from the scheduler itself, as opposed to unit failures,
/// which are job outcomes rather than errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("Job '{job_id}' is {status}, expected {expected}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        expected: JobStatus,
    },

    #[error("Job '{0}' has no channel audio URLs; admission did not complete")]
    MissingChannels(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// A single failed attempt inside a unit. The retry wrapper decides
/// whether another attempt is worth making.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A job invariant does not hold (missing row, missing transcript
    /// path). Retrying cannot fix state that should already exist.
    #[error("{0}")]
    State(String),
}

impl Retryable for UnitError {
    fn is_fatal(&self) -> bool {
        match self {
            UnitError::Service(e) => e.is_fatal(),
            UnitError::Serialize(_) | UnitError::State(_) => true,
            UnitError::Database(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_are_fatal() {
        let err = UnitError::State("job vanished".to_string());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_service_config_is_fatal() {
        let err = UnitError::Service(ServiceError::Config {
            service: "auth",
            reason: "bad client".to_string(),
        });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_service_status_is_retryable() {
        let err = UnitError::Service(ServiceError::Status {
            service: "transcription",
            status: 503,
            body: String::new(),
        });
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_database_errors_are_retryable() {
        let err = UnitError::Database(DatabaseError::LockPoisoned);
        assert!(!err.is_fatal());
    }
}
