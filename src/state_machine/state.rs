//! Conversation state types

use crate::datastore::{Appointment, DocumentType};
use crate::lockout::LockoutPolicy;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation stage. Persisted by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvState {
    #[default]
    Start,
    AwaitingDocType,
    AwaitingDocNumber,
    AwaitingConfirmation,
    SelectingOption,
    Cancelling,
    ConfirmingCancellation,
}

impl ConvState {
    pub fn name(self) -> &'static str {
        match self {
            ConvState::Start => "START",
            ConvState::AwaitingDocType => "AWAITING_DOC_TYPE",
            ConvState::AwaitingDocNumber => "AWAITING_DOC_NUMBER",
            ConvState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            ConvState::SelectingOption => "SELECTING_OPTION",
            ConvState::Cancelling => "CANCELLING",
            ConvState::ConfirmingCancellation => "CONFIRMING_CANCELLATION",
        }
    }

    /// States that require `current_appointment`
    pub fn needs_appointment(self) -> bool {
        matches!(
            self,
            ConvState::AwaitingConfirmation
                | ConvState::SelectingOption
                | ConvState::Cancelling
                | ConvState::ConfirmingCancellation
        )
    }
}

impl fmt::Display for ConvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted per-user conversation progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: ConvState,
    pub attempts: u32,
    pub document_type: Option<DocumentType>,
    pub current_appointment: Option<Appointment>,
    #[serde(default)]
    pub confirmed_appointments: Vec<Appointment>,
    /// Normalized text of the last reply we sent
    pub last_outbound_message: Option<String>,
    #[serde(default)]
    pub last_reply_was_validation_error: bool,
    /// Redelivery key of the last inbound message handled
    #[serde(default)]
    pub last_inbound_key: Option<String>,
    #[serde(default)]
    pub last_block_notice_at: Option<DateTime<Utc>>,
    pub last_interaction_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: ConvState::Start,
            attempts: 0,
            document_type: None,
            current_appointment: None,
            confirmed_appointments: Vec::new(),
            last_outbound_message: None,
            last_reply_was_validation_error: false,
            last_inbound_key: None,
            last_block_notice_at: None,
            last_interaction_at: now,
            blocked_until: None,
        }
    }

    /// Back to `START` with every flow reference cleared
    pub fn reset(&mut self) {
        self.state = ConvState::Start;
        self.attempts = 0;
        self.document_type = None;
        self.current_appointment = None;
        self.confirmed_appointments.clear();
    }

    /// Move to another stage; a successful step forgives earlier attempts
    pub fn advance(&mut self, state: ConvState) {
        self.state = state;
        self.attempts = 0;
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

/// How the echo guard compares an inbound message with our last reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateMatch {
    /// Whole normalized text must match
    #[default]
    Exact,
    /// Matching first token is enough
    FirstToken,
}

/// Tunables that shape the conversation
#[derive(Debug, Clone, Default)]
pub struct ConversationPolicy {
    pub lockout: LockoutPolicy,
    pub duplicate_match: DuplicateMatch,
}

/// Everything time- or configuration-dependent a transition may read
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub identifier: String,
    pub now: DateTime<Utc>,
    /// Local calendar date, for filtering past appointments
    pub today: NaiveDate,
    pub policy: ConversationPolicy,
}

impl SessionContext {
    pub fn new(
        identifier: impl Into<String>,
        now: DateTime<Utc>,
        today: NaiveDate,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            now,
            today,
            policy,
        }
    }
}
