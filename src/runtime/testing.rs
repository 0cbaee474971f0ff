//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::datastore::{Appointment, AppointmentKey, Confirmation, DatastoreError, DocumentType};
use crate::state_machine::Session;
use crate::store::{SessionMap, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// In-memory Session Store
// ============================================================================

/// Session store that keeps the last saved snapshot
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<SessionMap>,
    saves: AtomicUsize,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identifier: &str, session: Session) {
        self.sessions
            .lock()
            .unwrap()
            .insert(identifier.to_string(), session);
    }

    /// Make every later save fail
    pub fn fail_saves(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SessionMap {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> SessionMap {
        self.snapshot()
    }

    async fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        *self.sessions.lock().unwrap() = sessions.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Mock Datastore
// ============================================================================

/// Datastore with queued lookup results. An empty queue finds nothing.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockDatastore {
    lookup_results: Mutex<VecDeque<Result<Vec<Appointment>, DatastoreError>>>,
    upcoming: Mutex<Option<Result<Vec<Appointment>, DatastoreError>>>,
    fail_updates: AtomicBool,
    /// Record of lookups made
    pub lookups: Mutex<Vec<(DocumentType, String)>>,
    /// Record of updates made
    pub updates: Mutex<Vec<(AppointmentKey, Confirmation)>>,
    /// Record of `find_upcoming` windows requested
    pub upcoming_requests: Mutex<Vec<u32>>,
}

#[allow(dead_code)]
impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_lookup(&self, result: Result<Vec<Appointment>, DatastoreError>) {
        self.lookup_results.lock().unwrap().push_back(result);
    }

    pub fn set_upcoming(&self, result: Result<Vec<Appointment>, DatastoreError>) {
        *self.upcoming.lock().unwrap() = Some(result);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> Vec<(DocumentType, String)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(AppointmentKey, Confirmation)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentStore for MockDatastore {
    async fn find_appointments(
        &self,
        document_type: DocumentType,
        document_number: &str,
    ) -> Result<Vec<Appointment>, DatastoreError> {
        self.lookups
            .lock()
            .unwrap()
            .push((document_type, document_number.to_string()));
        self.lookup_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn update_confirmation(
        &self,
        key: &AppointmentKey,
        answer: Confirmation,
    ) -> Result<bool, DatastoreError> {
        self.updates.lock().unwrap().push((key.clone(), answer));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(DatastoreError::network("connection refused"));
        }
        Ok(true)
    }

    async fn find_upcoming(&self, days_ahead: u32) -> Result<Vec<Appointment>, DatastoreError> {
        self.upcoming_requests.lock().unwrap().push(days_ahead);
        self.upcoming
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Transport that records every message
#[allow(dead_code)]
#[derive(Default)]
pub struct MockTransport {
    /// Recipients whose sends fail
    failing: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, identifier: &str) {
        self.failing.lock().unwrap().push(identifier.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, identifier: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == identifier)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send(&self, identifier: &str, text: &str) -> bool {
        if self.failing.lock().unwrap().iter().any(|f| f == identifier) {
            return false;
        }
        self.sent
            .lock()
            .unwrap()
            .push((identifier.to_string(), text.to_string()));
        true
    }
}

// ============================================================================
// Mock Notifier
// ============================================================================

#[allow(dead_code)]
#[derive(Default)]
pub struct MockNotifier {
    pub notified: Mutex<Vec<Appointment>>,
}

#[allow(dead_code)]
impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<Appointment> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl CancellationNotifier for MockNotifier {
    async fn notify_cancellation(&self, appointment: &Appointment) -> bool {
        self.notified.lock().unwrap().push(appointment.clone());
        true
    }
}

// ============================================================================
// Mock Clock
// ============================================================================

/// Manually advanced clock; `today` is the UTC date of `now`
#[allow(dead_code)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}
