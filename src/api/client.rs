use async_trait::async_trait;
use serde_json::Value;

use super::error::ApiError;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Remote key-scoped store of JSON artifacts.
///
/// Implementations hand back the artifact body itself, with any response
/// envelope already stripped.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short name used in logs (e.g. "http", "memory")
    fn store_name(&self) -> &str;

    /// Fetch the artifact stored under `key`
    async fn fetch(&self, key: &str) -> Result<Value, ApiError>;

    /// Replace the artifact stored under `key`
    async fn put(&self, key: &str, payload: &Value) -> Result<(), ApiError>;
}
