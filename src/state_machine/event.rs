//! Events that can occur in a conversation

use crate::datastore::{Appointment, Confirmation};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// A user message, already normalized
    Inbound {
        text: String,
        /// Channel message id, or a timestamp/text fallback
        dedup_key: String,
    },

    // Datastore results
    LookupCompleted {
        result: Result<Vec<Appointment>, String>,
    },
    ConfirmationRecorded {
        answer: Confirmation,
        success: bool,
    },
    CancellationRecorded {
        success: bool,
    },
}

impl Event {
    pub fn inbound(text: impl Into<String>, dedup_key: impl Into<String>) -> Self {
        Event::Inbound {
            text: text.into(),
            dedup_key: dedup_key.into(),
        }
    }
}
