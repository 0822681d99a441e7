//! Competitor analysis client.

use std::time::Duration;

use super::error::ServiceError;
use super::{build_client, read_json, CompetitorDetector};

const SERVICE: &str = "analysis";

pub struct AnalysisClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(SERVICE, timeout)?,
            base_url: base_url.into(),
        })
    }
}

impl CompetitorDetector for AnalysisClient {
    fn detect(&self, transcript_text: &str) -> Result<Vec<String>, ServiceError> {
        let response = self
            .http
            .post(format!("{}/find-competitors", self.base_url))
            .json(&serde_json::json!({ "transcript_text": transcript_text }))
            .send()
            .map_err(|e| ServiceError::Network {
                service: SERVICE,
                source: e,
            })?;

        let value = read_json(SERVICE, response)?;
        parse_competitors_response(value)
    }
}

fn parse_competitors_response(value: serde_json::Value) -> Result<Vec<String>, ServiceError> {
    let names = value
        .get("competitors_found")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ServiceError::Malformed {
            service: SERVICE,
            reason: "response has no competitors_found array".to_string(),
        })?;

    names
        .iter()
        .map(|n| {
            n.as_str()
                .map(str::to_string)
                .ok_or_else(|| ServiceError::Malformed {
                    service: SERVICE,
                    reason: "competitors_found contains a non-string entry".to_string(),
                })
        })
        .collect()
}
