//! Runtime for executing conversations
//!
//! Owns the in-memory session map and runs effects produced by the state
//! machine against the datastore, the chat transport and the session store.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::datastore::SupabaseStore;
use crate::state_machine::ConvState;
use crate::store::SessionStore;
use crate::transport::WhatsAppClient;
use chrono::Utc;
use std::sync::Arc;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    SessionRuntime<Arc<dyn SessionStore>, Arc<SupabaseStore>, Arc<WhatsAppClient>>;

/// One text message from the chat channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender phone number
    pub identifier: String,
    pub text: String,
    /// Channel message id, when delivered
    pub message_id: Option<String>,
    /// Unix seconds
    pub received_at: i64,
}

impl InboundMessage {
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            message_id: None,
            received_at: Utc::now().timestamp(),
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_received_at(mut self, unix_seconds: i64) -> Self {
        self.received_at = unix_seconds;
        self
    }

    /// Key that identifies a redelivery of this same message
    pub fn dedup_key(&self) -> String {
        match self.message_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}:{}", self.received_at, self.text),
        }
    }
}

/// What `dispatch` did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Dropped before reaching the state machine
    Ignored,
    Handled { state: ConvState, replies: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_prefers_message_id() {
        let msg = InboundMessage::new("573001234567", "hola")
            .with_message_id("wamid.ABC")
            .with_received_at(1_700_000_000);
        assert_eq!(msg.dedup_key(), "wamid.ABC");

        let msg = InboundMessage::new("573001234567", "hola").with_received_at(1_700_000_000);
        assert_eq!(msg.dedup_key(), "1700000000:hola");

        let msg = msg.with_message_id("");
        assert_eq!(msg.dedup_key(), "1700000000:hola");
    }
}
