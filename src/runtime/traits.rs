//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

pub use crate::datastore::AppointmentStore;
pub use crate::store::SessionStore;
pub use crate::transport::{CancellationNotifier, MessageTransport};

use super::{DispatchOutcome, InboundMessage};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};

/// Entry point for channel messages, as seen by the HTTP layer
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> DispatchOutcome;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar date
    fn today(&self) -> NaiveDate;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
