//! Failure notification client.
//!
//! Notifications are best-effort: delivery failures are logged and
//! dropped so a broken notification service can never turn a job
//! outcome into a different one.

use std::time::Duration;

use serde::Serialize;

use super::error::ServiceError;
use super::{build_client, check_status, Notifier};

const SERVICE: &str = "notification";

/// A failure event worth telling someone about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NotificationEvent {
    JobFailed {
        job_id: String,
        filename: String,
        error_message: String,
    },
    UnitFailed {
        unit: String,
        job_id: String,
        error_message: String,
    },
}

impl NotificationEvent {
    fn endpoint(&self) -> &'static str {
        match self {
            NotificationEvent::JobFailed { .. } => "/notify/job-failed",
            NotificationEvent::UnitFailed { .. } => "/notify/task-failed",
        }
    }
}

pub struct HttpNotifier {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }

    fn send(&self, event: &NotificationEvent) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, event.endpoint()))
            .json(event)
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;
        check_status(SERVICE, response)
    }
}

impl Notifier for HttpNotifier {
    fn notify(&self, event: &NotificationEvent) {
        if let Err(e) = self.send(event) {
            log::warn!("Failed to deliver notification: {}", e);
        }
    }
}

/// Used when no notification service is configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &NotificationEvent) {}
}
