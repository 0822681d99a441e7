//! Service error classification.
//!
//! Every adapter call resolves to one of these classes before it
//! leaves the adapter; nothing above the services layer sees a raw
//! transport error.

use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport-level failure: timeout, connection refused, DNS.
    #[error("{service} request failed: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the payload did not have the
    /// expected shape.
    #[error("{service} returned a malformed response: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },

    /// Missing or unusable client configuration. Never retried.
    #[error("{service} is misconfigured: {reason}")]
    Config {
        service: &'static str,
        reason: String,
    },
}

impl Retryable for ServiceError {
    fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Config { .. })
    }
}
