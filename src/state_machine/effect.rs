//! Effects produced by state transitions

use crate::datastore::{Appointment, AppointmentKey, Confirmation, DocumentType};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write the session map to the session store
    PersistSession,

    /// Send a chat reply to the user
    SendReply { text: String },

    /// Query the datastore; answered with `Event::LookupCompleted`
    LookupAppointments {
        document_type: DocumentType,
        document_number: String,
    },

    /// Write the confirmation column; answered with
    /// `Event::ConfirmationRecorded` or `Event::CancellationRecorded`
    UpdateConfirmation {
        key: AppointmentKey,
        answer: Confirmation,
        /// True when this write cancels a confirmed appointment
        cancellation: bool,
    },

    /// Tell the clinic a patient cancelled
    NotifyCancellation { appointment: Appointment },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::SendReply { text: text.into() }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Effect::SendReply { .. })
    }
}
