//! Pure state transition function
//!
//! Inbound messages pass through the guards in a fixed order before the
//! per-state handler sees them: redelivery, typing indicator, lockout, echo.

use super::replies;
use super::state::{ConvState, DuplicateMatch, Session, SessionContext};
use super::{Effect, Event};
use crate::datastore::{Appointment, Confirmation, DocumentType};
use crate::lockout::{self, AttemptOutcome, LockStatus};
use crate::normalize::{first_token, is_all_digits, normalize, TYPING_INDICATOR};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Nothing to persist and nothing to send
    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn replies(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().filter_map(|e| match e {
            Effect::SendReply { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition {
        state: ConvState,
        event: &'static str,
    },
}

/// Pure transition function
///
/// Given the same session, context and event it always produces the same
/// result. All I/O is described by the returned effects.
pub fn transition(
    session: &Session,
    ctx: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Inbound { text, dedup_key } => Ok(on_inbound(session, ctx, &text, dedup_key)),

        Event::LookupCompleted { result } => {
            expect_state(session, ConvState::AwaitingDocNumber, "LookupCompleted")?;
            Ok(on_lookup_completed(session.clone(), ctx, result))
        }

        Event::ConfirmationRecorded { answer, success } => {
            expect_state(
                session,
                ConvState::AwaitingConfirmation,
                "ConfirmationRecorded",
            )?;
            Ok(on_confirmation_recorded(session.clone(), answer, success))
        }

        Event::CancellationRecorded { success } => {
            expect_state(
                session,
                ConvState::ConfirmingCancellation,
                "CancellationRecorded",
            )?;
            Ok(on_cancellation_recorded(session.clone(), success))
        }
    }
}

fn expect_state(
    session: &Session,
    expected: ConvState,
    event: &'static str,
) -> Result<(), TransitionError> {
    if session.state == expected {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            state: session.state,
            event,
        })
    }
}

// ============================================================
// Inbound messages
// ============================================================

fn on_inbound(session: &Session, ctx: &SessionContext, text: &str, key: String) -> TransitionResult {
    // Redelivered webhook: no state change, no reply
    if session.last_inbound_key.as_deref() == Some(key.as_str()) {
        return TransitionResult::new(session.clone());
    }

    let mut next = session.clone();
    next.last_inbound_key = Some(key);
    next.last_interaction_at = ctx.now;

    if text == TYPING_INDICATOR {
        return persist_only(next);
    }

    if next.state != ConvState::Start {
        if let LockStatus::Blocked { notice } =
            lockout::check(&mut next, &ctx.policy.lockout, ctx.now)
        {
            let result = persist_only(next);
            return match notice {
                Some(text) => result.with_effect(Effect::reply(text)),
                None => result,
            };
        }

        if is_echo(&next, text, ctx.policy.duplicate_match) {
            return persist_only(next);
        }
    }

    match next.state {
        ConvState::Start => on_start(next, text),
        ConvState::AwaitingDocType => on_doc_type(next, ctx, text),
        ConvState::AwaitingDocNumber => on_doc_number(next, ctx, text),
        ConvState::AwaitingConfirmation => on_confirmation_answer(next, ctx, text),
        ConvState::SelectingOption => on_option(next, ctx, text),
        ConvState::Cancelling => on_cancel_selection(next, ctx, text),
        ConvState::ConfirmingCancellation => on_cancel_answer(next, ctx, text),
    }
}

/// True when the inbound text repeats our own last reply
fn is_echo(session: &Session, text: &str, mode: DuplicateMatch) -> bool {
    let Some(last) = session
        .last_outbound_message
        .as_deref()
        .filter(|l| !l.is_empty())
    else {
        return false;
    };

    if text == last {
        return true;
    }

    if mode == DuplicateMatch::FirstToken {
        if let Some(token) = first_token(text) {
            if first_token(last) == Some(token) {
                return true;
            }
        }
    }

    // Some clients quote the error back with the user's retry appended
    session.last_reply_was_validation_error && text.contains(last)
}

fn on_start(mut next: Session, text: &str) -> TransitionResult {
    match text {
        "hola" => respond(next, replies::greeting()),
        "cita" => {
            next.reset();
            next.advance(ConvState::AwaitingDocType);
            respond(next, replies::doc_type_prompt())
        }
        // Unprompted chatter in START gets no reply
        _ => persist_only(next),
    }
}

fn on_doc_type(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    match DocumentType::parse(text) {
        Some(document_type) => {
            next.document_type = Some(document_type);
            next.advance(ConvState::AwaitingDocNumber);
            respond(next, replies::doc_number_prompt())
        }
        None => reject(next, ctx, replies::invalid_doc_type()),
    }
}

fn on_doc_number(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    let Some(document_type) = next.document_type else {
        next.advance(ConvState::AwaitingDocType);
        return respond(next, replies::doc_type_prompt());
    };

    if !is_all_digits(text) {
        return reject(next, ctx, replies::invalid_doc_number());
    }

    persist_only(next).with_effect(Effect::LookupAppointments {
        document_type,
        document_number: text.to_string(),
    })
}

fn on_confirmation_answer(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    let Some(appointment) = next.current_appointment.clone() else {
        next.reset();
        return respond(next, replies::flow_restarted());
    };

    match Confirmation::parse(text) {
        Some(answer) => persist_only(next).with_effect(Effect::UpdateConfirmation {
            key: appointment.key(),
            answer,
            cancellation: false,
        }),
        None => reject(next, ctx, replies::answer_yes_no()),
    }
}

fn on_option(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    let pending = next
        .current_appointment
        .clone()
        .filter(Appointment::is_pending);
    let has_confirmed = !next.confirmed_appointments.is_empty();

    match (text, pending) {
        ("cancelar cita", _) if has_confirmed => {
            next.advance(ConvState::Cancelling);
            let text = replies::cancellable_list(&next.confirmed_appointments);
            respond(next, text)
        }
        ("confirmar", Some(appointment)) => {
            next.advance(ConvState::AwaitingConfirmation);
            respond(next, replies::pending_appointment(&appointment))
        }
        ("cita", _) => {
            next.reset();
            respond(next, replies::flow_restarted())
        }
        (_, pending) => reject(
            next,
            ctx,
            replies::invalid_option(has_confirmed, pending.is_some()),
        ),
    }
}

fn on_cancel_selection(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    let count = next.confirmed_appointments.len();
    if count == 0 {
        next.reset();
        return respond(next, replies::flow_restarted());
    }

    if text == "terminar" {
        next.reset();
        return respond(next, replies::farewell());
    }

    let choice = text
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
        .map(|n| next.confirmed_appointments[n - 1].clone());

    match choice {
        Some(appointment) => {
            let text = replies::confirm_cancellation(&appointment);
            next.current_appointment = Some(appointment);
            next.advance(ConvState::ConfirmingCancellation);
            respond(next, text)
        }
        None => reject(next, ctx, replies::invalid_selection(count)),
    }
}

fn on_cancel_answer(mut next: Session, ctx: &SessionContext, text: &str) -> TransitionResult {
    let Some(appointment) = next.current_appointment.clone() else {
        next.reset();
        return respond(next, replies::flow_restarted());
    };

    match text {
        "si" => persist_only(next).with_effect(Effect::UpdateConfirmation {
            key: appointment.key(),
            answer: Confirmation::No,
            cancellation: true,
        }),
        "no" => {
            next.reset();
            respond(next, replies::cancellation_kept())
        }
        "terminar" => {
            next.reset();
            respond(next, replies::farewell())
        }
        _ => reject(next, ctx, replies::answer_cancellation()),
    }
}

// ============================================================
// Datastore results
// ============================================================

fn on_lookup_completed(
    mut next: Session,
    ctx: &SessionContext,
    result: Result<Vec<Appointment>, String>,
) -> TransitionResult {
    let rows = match result {
        Ok(rows) => rows,
        // Stay put so the user can resend the number
        Err(_) => return respond(next, replies::lookup_failed()),
    };

    let mut upcoming: Vec<Appointment> = rows
        .into_iter()
        .filter(|a| a.is_upcoming(ctx.today))
        .collect();
    upcoming.sort_by_key(Appointment::parsed_date);

    match upcoming.as_slice() {
        [] => {
            next.reset();
            respond(next, replies::not_found())
        }
        [only] if only.is_pending() => {
            let text = replies::pending_appointment(only);
            next.current_appointment = Some(only.clone());
            next.advance(ConvState::AwaitingConfirmation);
            respond(next, text)
        }
        all => {
            let has_pending = all.iter().any(Appointment::is_pending);
            let text = replies::appointment_list(all, all.iter().any(Appointment::is_confirmed), has_pending);
            next.confirmed_appointments = all.iter().filter(|a| a.is_confirmed()).cloned().collect();
            next.current_appointment = all
                .iter()
                .find(|a| a.is_pending())
                .or_else(|| all.first())
                .cloned();
            next.advance(ConvState::SelectingOption);
            respond(next, text)
        }
    }
}

fn on_confirmation_recorded(mut next: Session, answer: Confirmation, success: bool) -> TransitionResult {
    let text = match (success, answer) {
        (false, _) => replies::confirmation_failed(),
        (true, Confirmation::Si) => {
            let date = next
                .current_appointment
                .as_ref()
                .map(|a| a.date.clone())
                .unwrap_or_default();
            replies::attendance_confirmed(&date)
        }
        (true, Confirmation::No) => replies::attendance_declined(),
    };
    next.reset();
    respond(next, text)
}

fn on_cancellation_recorded(mut next: Session, success: bool) -> TransitionResult {
    let appointment = next.current_appointment.take();
    next.reset();

    match (success, appointment) {
        (true, Some(appointment)) => {
            let text = replies::cancellation_done(&appointment.date);
            respond(next, text).with_effect(Effect::NotifyCancellation { appointment })
        }
        _ => respond(next, replies::cancellation_failed()),
    }
}

// ============================================================
// Helpers
// ============================================================

fn persist_only(session: Session) -> TransitionResult {
    TransitionResult::new(session).with_effect(Effect::PersistSession)
}

/// Persist, then send `text` as a regular reply
fn respond(mut session: Session, text: String) -> TransitionResult {
    session.last_outbound_message = Some(normalize(&text));
    session.last_reply_was_validation_error = false;
    persist_only(session).with_effect(Effect::reply(text))
}

/// Count an invalid input and answer with `error_text`, or with the lockout
/// message once the attempt limit is reached
fn reject(mut session: Session, ctx: &SessionContext, error_text: String) -> TransitionResult {
    let text = match lockout::register_invalid_attempt(&mut session, &ctx.policy.lockout, ctx.now) {
        AttemptOutcome::Retry => error_text,
        AttemptOutcome::LockedOut => replies::locked_out(),
    };
    session.last_outbound_message = Some(normalize(&text));
    session.last_reply_was_validation_error = true;
    persist_only(session).with_effect(Effect::reply(text))
}
