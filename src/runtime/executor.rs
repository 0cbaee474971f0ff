//! Session runtime executor

use super::traits::{
    AppointmentStore, CancellationNotifier, Clock, InboundHandler, MessageTransport, SessionStore,
    SystemClock,
};
use super::{DispatchOutcome, InboundMessage};
use crate::normalize::normalize;
use crate::state_machine::{
    transition, ConversationPolicy, Effect, Event, Session, SessionContext,
};
use crate::store::SessionMap;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Generic session runtime that can work with any store, datastore and
/// transport implementations
pub struct SessionRuntime<S, D, T>
where
    S: SessionStore + 'static,
    D: AppointmentStore + 'static,
    T: MessageTransport + 'static,
{
    sessions: RwLock<SessionMap>,
    /// One lock per identifier, held for a whole dispatch
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Orders snapshot writes so an older map never overwrites a newer one
    save_lock: Mutex<()>,
    store: S,
    datastore: D,
    transport: T,
    notifier: Option<Arc<dyn CancellationNotifier>>,
    clock: Arc<dyn Clock>,
    policy: ConversationPolicy,
    ignored_senders: HashSet<String>,
}

impl<S, D, T> SessionRuntime<S, D, T>
where
    S: SessionStore + 'static,
    D: AppointmentStore + 'static,
    T: MessageTransport + 'static,
{
    pub fn new(store: S, datastore: D, transport: T, policy: ConversationPolicy) -> Self {
        Self {
            sessions: RwLock::new(SessionMap::new()),
            locks: Mutex::new(HashMap::new()),
            save_lock: Mutex::new(()),
            store,
            datastore,
            transport,
            notifier: None,
            clock: Arc::new(SystemClock),
            policy,
            ignored_senders: HashSet::new(),
        }
    }

    /// Create a runtime seeded with whatever the store holds
    pub async fn restore(store: S, datastore: D, transport: T, policy: ConversationPolicy) -> Self {
        let sessions = store.load().await;
        let runtime = Self::new(store, datastore, transport, policy);
        *runtime.sessions.write().await = sessions;
        runtime
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CancellationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ignored_senders(mut self, senders: impl IntoIterator<Item = String>) -> Self {
        self.ignored_senders = senders.into_iter().collect();
        self
    }

    pub async fn session(&self, identifier: &str) -> Option<Session> {
        self.sessions.read().await.get(identifier).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn is_ignored(&self, identifier: &str) -> bool {
        self.ignored_senders.contains(identifier)
    }

    /// Handle one inbound message end to end
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let identifier = message.identifier.trim();
        if identifier.is_empty() || message.text.trim().is_empty() {
            tracing::debug!("Dropping message without sender or text");
            return DispatchOutcome::Ignored;
        }
        if self.is_ignored(identifier) {
            tracing::debug!(identifier = %identifier, "Dropping message from ignored sender");
            return DispatchOutcome::Ignored;
        }

        let lock = self.lock_for(identifier).await;
        let _guard = lock.lock().await;
        let started = Instant::now();

        let now = self.clock.now();
        let ctx = SessionContext::new(identifier, now, self.clock.today(), self.policy.clone());
        let mut session = self
            .session(identifier)
            .await
            .unwrap_or_else(|| Session::new(now));

        tracing::debug!(identifier = %identifier, text = %message.text, "Inbound message");

        let mut replies = 0;
        let mut events_to_process = vec![Event::inbound(normalize(&message.text), message.dedup_key())];

        while let Some(event) = events_to_process.pop() {
            // Pure state transition
            let result = match transition(&session, &ctx, event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(identifier = %identifier, state = %session.state, error = %e, "Dropping event");
                    break;
                }
            };
            session = result.session;

            // Execute effects and collect generated events
            for effect in result.effects {
                if effect.is_reply() {
                    replies += 1;
                }
                if let Some(generated) = self.execute_effect(identifier, &session, effect).await {
                    events_to_process.push(generated);
                }
            }
        }

        tracing::info!(
            identifier = %identifier,
            state = %session.state,
            attempts = session.attempts,
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Message handled"
        );

        DispatchOutcome::Handled {
            state: session.state,
            replies,
        }
    }

    /// Locks live as long as the runtime, like the sessions they guard
    async fn lock_for(&self, identifier: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn execute_effect(&self, identifier: &str, session: &Session, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PersistSession => {
                self.persist(identifier, session).await;
                None
            }

            Effect::SendReply { text } => {
                if !self.transport.send(identifier, &text).await {
                    tracing::warn!(identifier = %identifier, "Reply was not delivered");
                }
                None
            }

            Effect::LookupAppointments {
                document_type,
                document_number,
            } => {
                let result = self
                    .datastore
                    .find_appointments(document_type, &document_number)
                    .await
                    .map_err(|e| {
                        tracing::error!(identifier = %identifier, error = %e, "Appointment lookup failed");
                        e.to_string()
                    });
                Some(Event::LookupCompleted { result })
            }

            Effect::UpdateConfirmation {
                key,
                answer,
                cancellation,
            } => {
                let success = match self.datastore.update_confirmation(&key, answer).await {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::warn!(identifier = %identifier, ?key, "No appointment row matched the update");
                        false
                    }
                    Err(e) => {
                        tracing::error!(identifier = %identifier, error = %e, "Confirmation update failed");
                        false
                    }
                };
                Some(if cancellation {
                    Event::CancellationRecorded { success }
                } else {
                    Event::ConfirmationRecorded { answer, success }
                })
            }

            Effect::NotifyCancellation { appointment } => {
                match &self.notifier {
                    Some(notifier) => {
                        if !notifier.notify_cancellation(&appointment).await {
                            tracing::warn!(identifier = %identifier, "Cancellation notice was not sent");
                        }
                    }
                    None => {
                        tracing::debug!(identifier = %identifier, "No cancellation notifier configured");
                    }
                }
                None
            }
        }
    }

    /// Update the in-memory map, then write a snapshot of it
    async fn persist(&self, identifier: &str, session: &Session) {
        let _ordered = self.save_lock.lock().await;
        self.sessions
            .write()
            .await
            .insert(identifier.to_string(), session.clone());

        let snapshot = self.sessions.read().await.clone();
        if let Err(e) = self.store.save(&snapshot).await {
            // The in-memory session stays authoritative
            tracing::error!(identifier = %identifier, error = %e, "Failed to persist sessions");
        }
    }
}

#[async_trait]
impl<S, D, T> InboundHandler for SessionRuntime<S, D, T>
where
    S: SessionStore + 'static,
    D: AppointmentStore + 'static,
    T: MessageTransport + 'static,
{
    async fn handle(&self, message: InboundMessage) -> DispatchOutcome {
        self.dispatch(message).await
    }
}
