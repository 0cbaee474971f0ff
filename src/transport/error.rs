//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Delivery error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    /// Classify a non-success HTTP status from the messaging API
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => TransportErrorKind::Auth,
            429 => TransportErrorKind::RateLimit,
            400..=499 => TransportErrorKind::InvalidRequest,
            500..=599 => TransportErrorKind::ServerError,
            _ => TransportErrorKind::Unknown,
        };
        Self::new(kind, format!("HTTP {status}: {body}"))
    }
}

/// Error classification for logging and pacing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Network issues, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Token rejected (401, 403)
    Auth,
    /// Payload or recipient refused (400)
    InvalidRequest,
    Unknown,
}

impl TransportErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}
