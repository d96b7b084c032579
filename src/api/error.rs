use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Invalid API response: {0}")]
    ParseError(String),

    #[error("Artifact store error: {status} - {message}")]
    StoreError { status: u16, message: String },

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}

impl ApiError {
    /// Map a transport error, keeping timeouts and connection failures apart
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::TimeoutError(err.to_string())
        } else if err.is_connect() {
            ApiError::NetworkError(err.to_string())
        } else {
            ApiError::HttpError(err)
        }
    }
}
