//! Process configuration from environment variables

use crate::datastore::SupabaseConfig;
use crate::lockout::{
    LockoutPolicy, DEFAULT_LOCKOUT_MINUTES, DEFAULT_MAX_ATTEMPTS, DEFAULT_NOTICE_INTERVAL_MINUTES,
};
use crate::reminder::{ReminderConfig, DEFAULT_COUNTRY_CODE, DEFAULT_DAYS_AHEAD};
use crate::state_machine::{ConversationPolicy, DuplicateMatch};
use crate::transport::{SmtpConfig, WhatsAppConfig, DEFAULT_API_BASE};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TABLE: &str = "Citas";
const DEFAULT_STATE_PATH: &str = "estado_usuarios.json";
const DEFAULT_SMTP_PORT: u16 = 587;
/// One year
const MAX_WINDOW_MINUTES: i64 = 365 * 24 * 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where sessions are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub verify_token: Option<String>,
    pub whatsapp: WhatsAppConfig,
    pub supabase: SupabaseConfig,
    pub session_backend: SessionBackend,
    pub session_state_path: PathBuf,
    pub policy: ConversationPolicy,
    pub reminder: ReminderConfig,
    pub ignored_senders: Vec<String>,
    /// Cancellation e-mails are off when `None`
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let supabase_url = env.required("SUPABASE_URL")?;
        if !(supabase_url.starts_with("http://") || supabase_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "SUPABASE_URL",
                value: supabase_url,
                reason: "must be an http(s) URL".into(),
            });
        }

        let max_attempts: u32 = env.parsed("MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let lockout_duration = window(
            "LOCKOUT_MINUTES",
            env.parsed("LOCKOUT_MINUTES", DEFAULT_LOCKOUT_MINUTES)?,
        )?;
        let notice_interval = window(
            "BLOCK_NOTICE_MINUTES",
            env.parsed("BLOCK_NOTICE_MINUTES", DEFAULT_NOTICE_INTERVAL_MINUTES)?,
        )?;

        let duplicate_match = match env.get("DUPLICATE_MATCH").as_deref() {
            None | Some("exact") => DuplicateMatch::Exact,
            Some("first_token") => DuplicateMatch::FirstToken,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "DUPLICATE_MATCH",
                    value: other.to_string(),
                    reason: "expected exact or first_token".into(),
                })
            }
        };

        let session_backend = match env.get("SESSION_BACKEND").as_deref() {
            None | Some("json") => SessionBackend::Json,
            Some("sqlite") => SessionBackend::Sqlite,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SESSION_BACKEND",
                    value: other.to_string(),
                    reason: "expected json or sqlite".into(),
                })
            }
        };

        let interval = seconds(
            "REMINDER_INTERVAL_HOURS",
            env.parsed("REMINDER_INTERVAL_HOURS", 24)?,
            60 * 60,
        )?;
        let retry_interval = seconds(
            "REMINDER_RETRY_MINUTES",
            env.parsed("REMINDER_RETRY_MINUTES", 60)?,
            60,
        )?;
        let pacing_secs: u64 = env.parsed("REMINDER_PACING_SECS", 2)?;

        Ok(Self {
            port: env.parsed("OHIBOT_PORT", DEFAULT_PORT)?,
            verify_token: env.get("VERIFY_TOKEN"),
            whatsapp: WhatsAppConfig {
                api_base: env
                    .get("WHATSAPP_API_BASE")
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                phone_number_id: env.required("WHATSAPP_PHONE_NUMBER_ID")?,
                access_token: env.required("WHATSAPP_TOKEN")?,
            },
            supabase: SupabaseConfig {
                url: supabase_url,
                api_key: env.required("SUPABASE_KEY")?,
                table: env
                    .get("SUPABASE_TABLE")
                    .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            },
            session_backend,
            session_state_path: env
                .get("SESSION_STATE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_PATH), PathBuf::from),
            policy: ConversationPolicy {
                lockout: LockoutPolicy {
                    max_attempts,
                    lockout_duration,
                    notice_interval,
                },
                duplicate_match,
            },
            reminder: ReminderConfig {
                days_ahead: env.parsed("REMINDER_DAYS_AHEAD", DEFAULT_DAYS_AHEAD)?,
                interval,
                retry_interval,
                pacing: Duration::from_secs(pacing_secs),
                country_code: env
                    .get("REMINDER_COUNTRY_CODE")
                    .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string()),
            },
            ignored_senders: env
                .get("IGNORED_SENDERS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            smtp: smtp_config(&env)?,
        })
    }
}

fn smtp_config<F>(env: &Env<F>) -> Result<Option<SmtpConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (Some(server), Some(username), Some(password), Some(recipient)) = (
        env.get("SMTP_SERVER"),
        env.get("SMTP_USER"),
        env.get("SMTP_PASSWORD"),
        env.get("RECEIVE_EMAIL"),
    ) else {
        return Ok(None);
    };

    Ok(Some(SmtpConfig {
        server,
        port: env.parsed("SMTP_PORT", DEFAULT_SMTP_PORT)?,
        username,
        password,
        sender: env.get("SENDER_EMAIL"),
        recipient,
    }))
}

/// Lockout windows are capped so `blocked_until` stays representable.
fn window(key: &'static str, minutes: i64) -> Result<chrono::Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: minutes.to_string(),
        reason,
    };
    if minutes < 0 {
        return Err(invalid("must not be negative".into()));
    }
    if minutes > MAX_WINDOW_MINUTES {
        return Err(invalid(format!("must be at most {MAX_WINDOW_MINUTES}")));
    }
    chrono::Duration::try_minutes(minutes).ok_or_else(|| invalid("out of range".into()))
}

fn seconds(key: &'static str, value: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "out of range".into(),
        })
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
