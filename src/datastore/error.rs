//! Datastore error types

use thiserror::Error;

/// Datastore error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DatastoreError {
    pub kind: DatastoreErrorKind,
    pub message: String,
}

impl DatastoreError {
    pub fn new(kind: DatastoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DatastoreErrorKind::Network, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(DatastoreErrorKind::InvalidInput, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DatastoreErrorKind::Decode, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => DatastoreErrorKind::Auth,
            429 => DatastoreErrorKind::RateLimit,
            400..=499 => DatastoreErrorKind::InvalidInput,
            _ => DatastoreErrorKind::Server,
        };
        Self::new(kind, format!("HTTP {status}: {body}"))
    }
}

/// Error classification, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreErrorKind {
    /// Connection failures and timeouts
    Network,
    /// Rejected credentials (401, 403)
    Auth,
    /// Too many requests (429)
    RateLimit,
    /// 5xx from the datastore
    Server,
    /// Request refused before or by the datastore (4xx, bad document number)
    InvalidInput,
    /// Response body did not match the expected shape
    Decode,
}

impl DatastoreErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::Server)
    }
}
