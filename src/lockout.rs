//! Failed-attempt accounting and temporary lockouts
//!
//! Expiry is lazy: nothing unblocks a user until their next message is
//! checked against `blocked_until`.

use crate::state_machine::state::Session;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 30;
pub const DEFAULT_NOTICE_INTERVAL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Invalid inputs allowed before a lockout (at least 1)
    pub max_attempts: u32,
    pub lockout_duration: Duration,
    /// Minimum spacing between "you are blocked" notices
    pub notice_interval: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
            notice_interval: Duration::minutes(DEFAULT_NOTICE_INTERVAL_MINUTES),
        }
    }
}

/// Result of [`check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    /// Never blocked
    Open,
    /// A lockout just lapsed; counters were cleared
    Expired,
    /// Still blocked. `notice` is set when a reminder of the block is due.
    Blocked { notice: Option<String> },
}

/// Result of [`register_invalid_attempt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Retry,
    LockedOut,
}

/// Evaluate (and lazily expire) the session's lockout
pub fn check(session: &mut Session, policy: &LockoutPolicy, now: DateTime<Utc>) -> LockStatus {
    let Some(until) = session.blocked_until else {
        return LockStatus::Open;
    };

    if now >= until {
        session.blocked_until = None;
        session.attempts = 0;
        return LockStatus::Expired;
    }

    let notice_due = session
        .last_block_notice_at
        .map_or(true, |sent| now - sent > policy.notice_interval);

    if !notice_due {
        return LockStatus::Blocked { notice: None };
    }

    session.last_block_notice_at = Some(now);
    LockStatus::Blocked {
        notice: Some(blocked_notice(remaining_minutes(until, now))),
    }
}

/// Count one invalid input; lock the session once the limit is reached
pub fn register_invalid_attempt(
    session: &mut Session,
    policy: &LockoutPolicy,
    now: DateTime<Utc>,
) -> AttemptOutcome {
    session.attempts = session.attempts.saturating_add(1);
    if session.attempts >= policy.max_attempts {
        session.blocked_until = Some(now + policy.lockout_duration);
        AttemptOutcome::LockedOut
    } else {
        AttemptOutcome::Retry
    }
}

/// Whole minutes left, rounded up so the notice never says 0
fn remaining_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    (seconds + 59) / 60
}

fn blocked_notice(minutes: i64) -> String {
    format!(
        "⏳ Has excedido el número máximo de intentos. Por favor intenta nuevamente en {minutes} minutos."
    )
}
