//! Session persistence
//!
//! The whole identifier → session map is loaded once at startup and written
//! back after every change. A missing or unreadable store starts empty.

mod json_file;
mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub type SessionMap = HashMap<String, Session>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session encoding error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Durable storage for conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read every session. Never fails: damage is logged and skipped.
    async fn load(&self) -> SessionMap;

    /// Replace the stored map with `sessions`
    async fn save(&self, sessions: &SessionMap) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self) -> SessionMap {
        (**self).load().await
    }

    async fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        (**self).save(sessions).await
    }
}

/// A session with every optional field populated
#[cfg(test)]
pub(crate) fn populated_session() -> Session {
    use crate::datastore::{Appointment, Confirmation, DocumentType};
    use crate::state_machine::ConvState;
    use chrono::{TimeZone, Utc};

    let appointment = |id: Option<i64>, date: &str, confirmation| Appointment {
        id,
        document_type: "CC".into(),
        document_number: "1020304050".into(),
        patient_name: "María Pérez".into(),
        specialty: "Cardiología".into(),
        physician_name: "Dr. Gómez".into(),
        date: date.into(),
        patient_phone: "3001234567".into(),
        confirmation,
    };
    let at = |h, m, s| Utc.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap();

    Session {
        state: ConvState::ConfirmingCancellation,
        attempts: 2,
        document_type: Some(DocumentType::Cc),
        current_appointment: Some(appointment(None, "2026-03-20", Some(Confirmation::Si))),
        confirmed_appointments: vec![
            appointment(None, "2026-03-20", Some(Confirmation::Si)),
            appointment(Some(42), "2026-04-02", Some(Confirmation::Si)),
        ],
        last_outbound_message: Some("responde si o no".into()),
        last_reply_was_validation_error: true,
        last_inbound_key: Some("wamid.HBgM".into()),
        last_block_notice_at: Some(at(9, 5, 0)),
        last_interaction_at: at(9, 12, 30),
        blocked_until: Some(at(9, 35, 0)),
    }
}
