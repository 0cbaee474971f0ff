//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary message sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::datastore::{Appointment, Confirmation};
use crate::normalize::{normalize, TYPING_INDICATOR};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
}

fn test_context(minute: i64) -> SessionContext {
    SessionContext::new(
        "573001234567",
        t0() + Duration::minutes(minute),
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        ConversationPolicy::default(),
    )
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hola".to_string()),
        Just("Cita".to_string()),
        Just("CC".to_string()),
        Just("ti".to_string()),
        Just("xx".to_string()),
        Just("1020304050".to_string()),
        Just("12a".to_string()),
        Just("Sí".to_string()),
        Just("no".to_string()),
        Just("confirmar".to_string()),
        Just("cancelar cita".to_string()),
        Just("terminar".to_string()),
        Just("1".to_string()),
        Just("2".to_string()),
        Just("escribiendo...".to_string()),
        "[a-zA-Z0-9 ]{0,12}",
    ]
}

fn arb_confirmation() -> impl Strategy<Value = Option<Confirmation>> {
    prop_oneof![
        Just(None),
        Just(Some(Confirmation::Si)),
        Just(Some(Confirmation::No)),
    ]
}

fn arb_appointment() -> impl Strategy<Value = Appointment> {
    (1i64..100, 1u32..28, 2u32..5, arb_confirmation()).prop_map(|(id, day, month, confirmation)| {
        Appointment {
            id: Some(id),
            document_type: "CC".into(),
            document_number: "1020304050".into(),
            patient_name: "Ana".into(),
            specialty: "Medicina general".into(),
            physician_name: "Dr. Ruiz".into(),
            date: format!("2026-{month:02}-{day:02}"),
            patient_phone: "3001234567".into(),
            confirmation,
        }
    })
}

#[derive(Debug, Clone)]
enum Step {
    Message(String),
    Redeliver,
    Lookup(Result<Vec<Appointment>, String>),
    Confirmed(Confirmation, bool),
    Cancelled(bool),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => arb_text().prop_map(Step::Message),
        1 => Just(Step::Redeliver),
        2 => proptest::collection::vec(arb_appointment(), 0..4).prop_map(|v| Step::Lookup(Ok(v))),
        1 => Just(Step::Lookup(Err("timeout".into()))),
        1 => (prop_oneof![Just(Confirmation::Si), Just(Confirmation::No)], any::<bool>())
            .prop_map(|(a, ok)| Step::Confirmed(a, ok)),
        1 => any::<bool>().prop_map(Step::Cancelled),
    ]
}

fn to_event(step: &Step, index: usize, last_key: &str) -> Event {
    match step {
        Step::Message(text) => Event::inbound(normalize(text), format!("wamid.{index}")),
        Step::Redeliver => Event::inbound("cita", last_key),
        Step::Lookup(result) => Event::LookupCompleted {
            result: result.clone(),
        },
        Step::Confirmed(answer, success) => Event::ConfirmationRecorded {
            answer: *answer,
            success: *success,
        },
        Step::Cancelled(success) => Event::CancellationRecorded { success: *success },
    }
}

// ============================================================================
// State Validity Checkers
// ============================================================================

fn is_valid_session(session: &Session, ctx: &SessionContext) -> bool {
    let policy = &ctx.policy.lockout;

    // Attempts only reach the limit while a lockout is recorded
    if session.blocked_until.is_none() && session.attempts >= policy.max_attempts {
        return false;
    }

    match session.state {
        ConvState::Start => session.current_appointment.is_none() && session.document_type.is_none(),
        ConvState::AwaitingDocNumber => session.document_type.is_some(),
        ConvState::Cancelling => {
            session.current_appointment.is_some() && !session.confirmed_appointments.is_empty()
        }
        state if state.needs_appointment() => session.current_appointment.is_some(),
        _ => true,
    }
}

fn persist_precedes_replies(effects: &[Effect]) -> bool {
    match effects.iter().position(Effect::is_reply) {
        Some(first_reply) => effects[..first_reply].contains(&Effect::PersistSession),
        None => true,
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any sequence of events keeps the session valid
    #[test]
    fn prop_transitions_preserve_validity(steps in proptest::collection::vec(arb_step(), 0..25)) {
        let mut session = Session::new(t0());
        let mut last_key = String::from("none");

        for (i, step) in steps.iter().enumerate() {
            let ctx = test_context(i as i64);
            let event = to_event(step, i, &last_key);
            if let Event::Inbound { dedup_key, .. } = &event {
                last_key = dedup_key.clone();
            }
            match transition(&session, &ctx, event) {
                Ok(result) => {
                    prop_assert!(
                        is_valid_session(&result.session, &ctx),
                        "invalid session after {:?}: {:?}", step, result.session
                    );
                    prop_assert!(persist_precedes_replies(&result.effects));
                    session = result.session;
                }
                Err(TransitionError::InvalidTransition { state, .. }) => {
                    prop_assert_eq!(state, session.state);
                }
            }
        }
    }

    /// Replaying the last inbound key changes nothing and sends nothing
    #[test]
    fn prop_redelivery_is_noop(
        steps in proptest::collection::vec(arb_text(), 1..10),
        replay in arb_text(),
    ) {
        let mut session = Session::new(t0());
        for (i, text) in steps.iter().enumerate() {
            let ctx = test_context(i as i64);
            if let Ok(result) = transition(&session, &ctx, Event::inbound(normalize(text), format!("k{i}"))) {
                session = result.session;
            }
        }
        let last_key = format!("k{}", steps.len() - 1);
        let result = transition(&session, &test_context(60), Event::inbound(normalize(&replay), last_key)).unwrap();
        prop_assert!(result.is_noop());
        prop_assert_eq!(result.session, session);
    }

    /// The typing indicator never moves the conversation or counts an attempt
    #[test]
    fn prop_typing_indicator_is_inert(steps in proptest::collection::vec(arb_text(), 0..10)) {
        let mut session = Session::new(t0());
        for (i, text) in steps.iter().enumerate() {
            if let Ok(result) = transition(&session, &test_context(i as i64), Event::inbound(normalize(text), format!("k{i}"))) {
                session = result.session;
            }
        }
        let result = transition(&session, &test_context(30), Event::inbound(TYPING_INDICATOR, "typing")).unwrap();
        prop_assert_eq!(result.session.state, session.state);
        prop_assert_eq!(result.session.attempts, session.attempts);
        prop_assert_eq!(result.effects, vec![Effect::PersistSession]);
    }

    /// START never punishes unknown input
    #[test]
    fn prop_start_never_counts_attempts(text in "[a-z0-9 ]{0,20}") {
        let session = Session::new(t0());
        let result = transition(&session, &test_context(0), Event::inbound(normalize(&text), "k")).unwrap();
        prop_assert_eq!(result.session.attempts, 0);
        prop_assert_eq!(result.session.blocked_until, None);
    }

    /// Reaching the attempt limit always records a lockout
    #[test]
    fn prop_repeated_invalid_doc_type_locks(garbage in "[a-z]{3,8}") {
        prop_assume!(crate::datastore::DocumentType::parse(&garbage).is_none());
        let mut session = Session::new(t0());
        session.state = ConvState::AwaitingDocType;

        let max = ConversationPolicy::default().lockout.max_attempts;
        for i in 0..max {
            let result = transition(&session, &test_context(0), Event::inbound(garbage.clone(), format!("k{i}"))).unwrap();
            session = result.session;
        }
        prop_assert_eq!(session.attempts, max);
        prop_assert!(session.is_blocked_at(t0()));
    }
}

// ============================================================================
// Sequence Tests - Multi-Step Scenarios
// ============================================================================

#[test]
fn test_full_confirmation_sequence() {
    let ctx = test_context(0);
    let mut session = Session::new(t0());

    for (i, text) in ["Cita", "cc"].iter().enumerate() {
        session = transition(&session, &ctx, Event::inbound(normalize(text), format!("k{i}")))
            .unwrap()
            .session;
    }
    let lookup = transition(&session, &ctx, Event::inbound("1020304050", "k2")).unwrap();
    assert!(lookup
        .effects
        .iter()
        .any(|e| matches!(e, Effect::LookupAppointments { .. })));

    let appointment = Appointment {
        id: Some(4),
        document_type: "CC".into(),
        document_number: "1020304050".into(),
        patient_name: "Ana".into(),
        specialty: "Pediatría".into(),
        physician_name: "Dra. Mora".into(),
        date: "2026-03-11".into(),
        patient_phone: "3001234567".into(),
        confirmation: None,
    };
    let found = transition(
        &lookup.session,
        &ctx,
        Event::LookupCompleted {
            result: Ok(vec![appointment]),
        },
    )
    .unwrap();
    assert_eq!(found.session.state, ConvState::AwaitingConfirmation);

    let answered = transition(&found.session, &ctx, Event::inbound("si", "k3")).unwrap();
    let done = transition(
        &answered.session,
        &ctx,
        Event::ConfirmationRecorded {
            answer: Confirmation::Si,
            success: true,
        },
    )
    .unwrap();
    assert_eq!(done.session.state, ConvState::Start);
    assert_eq!(done.session.attempts, 0);
    assert!(done.replies().next().unwrap().contains("2026-03-11"));
}
