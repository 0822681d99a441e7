//! Blob storage client.
//!
//! Stores and fetches JSON documents by object path. The download
//! endpoint wraps the stored document in response envelopes; those are
//! peeled here so callers get the document back exactly as stored.

use std::time::Duration;

use super::error::ServiceError;
use super::{build_client, check_status, read_json, BlobStore};

const SERVICE: &str = "storage";

pub struct StorageClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl StorageClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }
}

impl BlobStore for StorageClient {
    fn put(&self, path: &str, data: &serde_json::Value) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .json(&serde_json::json!({
                "object_path": path,
                "data": data,
            }))
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        check_status(SERVICE, response)
    }

    fn get(&self, path: &str) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .http
            .get(format!("{}/download/{}", self.base_url, path))
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let value = read_json(SERVICE, response)?;
        Ok(unwrap_envelopes(value))
    }
}

/// The download endpoint nests the stored document under one or two
/// `data` keys depending on which proxy answered. Unwraps until the
/// value no longer carries a `data` member.
fn unwrap_envelopes(mut value: serde_json::Value) -> serde_json::Value {
    loop {
        match value.get_mut("data") {
            Some(inner) => value = inner.take(),
            None => return value,
        }
    }
}
