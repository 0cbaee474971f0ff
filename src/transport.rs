//! Outbound messaging
//!
//! Chat replies and reminders go out through [`MessageTransport`]; the clinic
//! hears about cancellations through [`CancellationNotifier`].

mod email;
mod error;
mod whatsapp;

pub use email::{NotifierError, SmtpConfig, SmtpNotifier};
pub use error::{TransportError, TransportErrorKind};
pub use whatsapp::{WhatsAppClient, WhatsAppConfig, DEFAULT_API_BASE};

use crate::datastore::Appointment;
use async_trait::async_trait;
use std::sync::Arc;

/// Fire-and-forget message delivery. Failures are logged by the
/// implementation and reported as `false`.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, identifier: &str, text: &str) -> bool;
}

/// Out-of-band notice to clinic staff when a patient cancels
#[async_trait]
pub trait CancellationNotifier: Send + Sync {
    async fn notify_cancellation(&self, appointment: &Appointment) -> bool;
}

#[async_trait]
impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    async fn send(&self, identifier: &str, text: &str) -> bool {
        (**self).send(identifier, text).await
    }
}

#[async_trait]
impl<T: CancellationNotifier + ?Sized> CancellationNotifier for Arc<T> {
    async fn notify_cancellation(&self, appointment: &Appointment) -> bool {
        (**self).notify_cancellation(appointment).await
    }
}
