use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::api::{
    client::{ArtifactStore, RateLimitConfig},
    error::ApiError,
    rate_limiter::RateLimiter,
};

const ARTIFACTS_ENDPOINT: &str = "/api/users/artifacts";

/// Artifact store reached over HTTP.
///
/// `GET {base}/api/users/artifacts/{key}` answers `{"success": true, "data": ...}`,
/// `PUT` takes the bare artifact as the JSON body.
pub struct HttpArtifactStore {
    base_url: String,
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl HttpArtifactStore {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        rate_limit: RateLimitConfig,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::ConfigError("artifact store base URL is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            rate_limiter: RateLimiter::new(rate_limit),
        })
    }

    fn artifact_url(&self, key: &str) -> String {
        format!("{}{}/{}", self.base_url, ARTIFACTS_ENDPOINT, key)
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    fn store_name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, key: &str) -> Result<Value, ApiError> {
        self.rate_limiter.acquire().await;

        let url = self.artifact_url(key);
        log::debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_transport)?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(key.to_string()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimitError(envelope_message(&body)));
        }
        if !status.is_success() {
            return Err(ApiError::StoreError {
                status: status.as_u16(),
                message: envelope_message(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        unwrap_envelope(key, value)
    }

    async fn put(&self, key: &str, payload: &Value) -> Result<(), ApiError> {
        self.rate_limiter.acquire().await;

        let url = self.artifact_url(key);
        log::debug!("PUT {}", url);

        let response = self
            .http_client
            .put(&url)
            .json(payload)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_transport)?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimitError(envelope_message(&body)));
        }
        if !status.is_success() {
            return Err(ApiError::StoreError {
                status: status.as_u16(),
                message: envelope_message(&body),
            });
        }

        // Some deployments answer 200 with {"success": false}
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) {
            if map.get("success") == Some(&Value::Bool(false)) {
                return Err(ApiError::StoreError {
                    status: status.as_u16(),
                    message: envelope_message(&body),
                });
            }
        }

        Ok(())
    }
}

/// Strip the `{success, data}` envelope. Bodies without a `success` flag are
/// taken as the artifact itself.
pub(crate) fn unwrap_envelope(key: &str, value: Value) -> Result<Value, ApiError> {
    let Value::Object(mut map) = value else {
        return Err(ApiError::ParseError("expected a JSON object".to_string()));
    };

    match map.get("success") {
        None => Ok(Value::Object(map)),
        Some(Value::Bool(false)) => Err(ApiError::StoreError {
            status: 200,
            message: map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request rejected")
                .to_string(),
        }),
        Some(_) => match map.remove("data") {
            None | Some(Value::Null) => Err(ApiError::NotFound(key.to_string())),
            Some(data) => Ok(data),
        },
    }
}

fn envelope_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
