//! Appointment datastore
//!
//! The appointment records live in an external Supabase table. The core only
//! reads them and writes the confirmation column.

mod error;
mod supabase;
mod types;

pub use error::{DatastoreError, DatastoreErrorKind};
pub use supabase::{SupabaseConfig, SupabaseStore};
pub use types::{Appointment, AppointmentKey, Confirmation, DocumentType};

use async_trait::async_trait;
use std::sync::Arc;

/// Request/response interface to the appointment datastore
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// All appointments registered for a document
    async fn find_appointments(
        &self,
        document_type: DocumentType,
        document_number: &str,
    ) -> Result<Vec<Appointment>, DatastoreError>;

    /// Write the confirmation column. `Ok(false)` means no row matched.
    async fn update_confirmation(
        &self,
        key: &AppointmentKey,
        answer: Confirmation,
    ) -> Result<bool, DatastoreError>;

    /// Appointments scheduled exactly `days_ahead` days from today
    async fn find_upcoming(&self, days_ahead: u32) -> Result<Vec<Appointment>, DatastoreError>;
}

#[async_trait]
impl<T: AppointmentStore + ?Sized> AppointmentStore for Arc<T> {
    async fn find_appointments(
        &self,
        document_type: DocumentType,
        document_number: &str,
    ) -> Result<Vec<Appointment>, DatastoreError> {
        (**self).find_appointments(document_type, document_number).await
    }

    async fn update_confirmation(
        &self,
        key: &AppointmentKey,
        answer: Confirmation,
    ) -> Result<bool, DatastoreError> {
        (**self).update_confirmation(key, answer).await
    }

    async fn find_upcoming(&self, days_ahead: u32) -> Result<Vec<Appointment>, DatastoreError> {
        (**self).find_upcoming(days_ahead).await
    }
}
