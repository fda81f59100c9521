//! Detector error types.

use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector not configured: {0}")]
    NotConfigured(String),

    #[error("Detector returned {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectorError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn request_failed(status: u16, msg: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: msg.into(),
        }
    }

    /// Whether the call ran out of time (service overloaded or throttling).
    pub fn is_timeout(&self) -> bool {
        match self {
            DetectorError::Timeout(_) => true,
            DetectorError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether the service rejected the call for exceeding its rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DetectorError::RequestFailed { status: 429, .. })
    }
}
