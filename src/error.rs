//! Chat engine error types

use thiserror::Error;

/// Error from any exchange with the assistant backend, with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NotFound, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::ServerError, message)
    }

    pub fn stream_aborted(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::StreamAborted, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Remote, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ChatErrorKind::Cancelled, "Exchange cancelled")
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP status and its body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_detail(body).unwrap_or_else(|| body.trim().to_string());
        match status {
            401 | 403 => Self::auth(format!("Authentication failed: {message}")),
            400 | 422 => Self::invalid_request(format!("Invalid request: {message}")),
            404 => Self::not_found(format!("Not found: {message}")),
            429 => Self::rate_limit(format!("Rate limited: {message}")),
            500..=599 => Self::server_error(format!("Server error: {message}")),
            _ => Self::unknown(format!("HTTP {status}: {message}")),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ChatErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            ChatError::network(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            ChatError::unknown(format!("Failed to decode response: {e}"))
        } else if e.is_body() {
            ChatError::stream_aborted(format!("Response body failed: {e}"))
        } else {
            ChatError::unknown(format!("Request failed: {e}"))
        }
    }
}

/// Error classification for retry logic and user-facing notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Connection refused, DNS, timeouts
    Network,
    /// Missing or rejected credential (401, 403)
    Auth,
    /// Rejected by validation (400, 422) or by the client before sending
    InvalidRequest,
    /// Unknown session (404)
    NotFound,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Stream closed before a terminal frame
    StreamAborted,
    /// Backend reported a failure in-band (`error` frame or `success: false`)
    Remote,
    /// The caller abandoned the exchange
    Cancelled,
    Unknown,
}

impl ChatErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::RateLimit | Self::ServerError | Self::StreamAborted
        )
    }
}

/// Errors from driving the symptom assessment
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("An assessment exchange is already in flight")]
    Busy,
    #[error("Answer cannot be empty")]
    EmptyAnswer,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error(transparent)]
    Exchange(#[from] ChatError),
}

/// Pull a human-readable message out of a `FastAPI`-style error body.
///
/// Handles `{"detail": {"message": ".."}}`, `{"detail": ".."}` and
/// `{"message": ".."}`.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = parsed.get("detail").unwrap_or(&parsed);
    if let Some(message) = detail.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    detail.as_str().map(ToString::to_string)
}
