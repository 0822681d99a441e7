//! Authentication client.
//!
//! Obtains a bearer token via the password grant. Carries its own
//! short-backoff retry, independent of the unit-level retry wrapping
//! the pipeline stages: a unit attempt that needs a token gets up to
//! three token attempts of its own.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::error::ServiceError;
use super::{build_client, read_json, unwrap_array, TokenProvider};
use crate::retry::RetryPolicy;

const SERVICE: &str = "auth";

pub struct AuthClient {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: SecretString,
    retry: RetryPolicy,
}

impl AuthClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client("auth", timeout)?,
            base_url: base_url.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            retry,
        })
    }

    fn request_token(&self) -> Result<String, ServiceError> {
        let response = self
            .http
            .post(format!("{}/api/v1/login/access-token", self.base_url))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret()),
            ])
            .send()
            .map_err(|e| ServiceError::Network {
                service: "auth",
                source: e,
            })?;

        let value = read_json("auth", response)?;
        parse_token_response(value)
    }
}

impl TokenProvider for AuthClient {
    fn authenticate(&self) -> Result<String, ServiceError> {
        self.retry.run(|attempt| {
            if attempt > 0 {
                log::debug!("Token request retry, attempt {}", attempt + 1);
            }
            self.request_token()
        })
    }
}

/// Extracts the access token. The auth service sometimes wraps the
/// token object in a one-element array.
fn parse_token_response(value: serde_json::Value) -> Result<String, ServiceError> {
    let value = unwrap_array(value);
    value
        .get("access_token")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Malformed {
            service: SERVICE,
            reason: "response has no access_token field".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_token_response() {
        let token = parse_token_response(json!({
            "access_token": "tok-123",
            "token_type": "bearer"
        }))
        .unwrap();
        assert_eq!(token, "tok-123");
    }

    #[test]
    fn test_parse_array_wrapped_token_response() {
        let token = parse_token_response(json!([
            {"access_token": "tok-456", "token_type": "bearer"}
        ]))
        .unwrap();
        assert_eq!(token, "tok-456");
    }

    #[test]
    fn test_parse_missing_token_is_malformed() {
        let err = parse_token_response(json!({"token_type": "bearer"})).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { .. }));
    }

    #[test]
    fn test_parse_empty_array_is_malformed() {
        let err = parse_token_response(json!([])).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed { .. }));
    }
}
