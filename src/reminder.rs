//! Periodic attendance reminders
//!
//! Independent of inbound dispatch: reads the datastore, writes to the
//! transport, never touches sessions.

use crate::datastore::{Appointment, AppointmentStore, DatastoreError};
use crate::transport::MessageTransport;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DAYS_AHEAD: u32 = 3;
pub const DEFAULT_COUNTRY_CODE: &str = "+57";

/// Mobile numbers without a country code have this many digits
const NATIONAL_NUMBER_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Appointments this many days from today get a reminder
    pub days_ahead: u32,
    /// Pause between successful runs
    pub interval: Duration,
    /// Pause after a datastore failure
    pub retry_interval: Duration,
    /// Pause between two sends
    pub pacing: Duration,
    pub country_code: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            days_ahead: DEFAULT_DAYS_AHEAD,
            interval: Duration::from_secs(24 * 60 * 60),
            retry_interval: Duration::from_secs(60 * 60),
            pacing: Duration::from_secs(2),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }
}

/// Counts from one reminder batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    pub failed: usize,
    /// Unconfirmed appointments or unusable phone numbers
    pub skipped: usize,
}

pub struct ReminderScheduler<D, T> {
    datastore: D,
    transport: T,
    config: ReminderConfig,
}

impl<D, T> ReminderScheduler<D, T>
where
    D: AppointmentStore,
    T: MessageTransport,
{
    pub fn new(datastore: D, transport: T, config: ReminderConfig) -> Self {
        Self {
            datastore,
            transport,
            config,
        }
    }

    /// Send one batch of reminders
    pub async fn run_once(&self) -> Result<ReminderReport, DatastoreError> {
        let appointments = self.datastore.find_upcoming(self.config.days_ahead).await?;
        let mut report = ReminderReport::default();

        let mut first = true;
        for appointment in &appointments {
            if !appointment.is_confirmed() {
                report.skipped += 1;
                continue;
            }
            let Some(phone) = format_phone(&appointment.patient_phone, &self.config.country_code)
            else {
                tracing::warn!(id = ?appointment.id, "Appointment has no usable phone number");
                report.skipped += 1;
                continue;
            };

            if !first && !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }
            first = false;

            if self.transport.send(&phone, &reminder_text(appointment)).await {
                report.sent += 1;
            } else {
                tracing::error!(id = ?appointment.id, "Reminder was not delivered");
                report.failed += 1;
            }
        }

        Ok(report)
    }

    /// Run batches until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(days_ahead = self.config.days_ahead, "Starting reminder scheduler");

        loop {
            let pause = match self.run_once().await {
                Ok(report) if report == ReminderReport::default() => {
                    tracing::info!("No upcoming appointments to remind");
                    self.config.interval
                }
                Ok(report) => {
                    tracing::info!(
                        sent = report.sent,
                        failed = report.failed,
                        skipped = report.skipped,
                        "Reminder batch finished"
                    );
                    self.config.interval
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reminder batch failed");
                    self.config.retry_interval
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Reminder scheduler stopped");
    }
}

/// Digits only, with the country code prepended unless already there
pub fn format_phone(raw: &str, country_code: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let prefix: String = country_code.chars().filter(char::is_ascii_digit).collect();
    let has_prefix = raw.trim_start().starts_with('+')
        || (digits.starts_with(&prefix) && digits.len() > NATIONAL_NUMBER_LEN);

    if has_prefix || prefix.is_empty() {
        Some(format!("+{digits}"))
    } else {
        Some(format!("+{prefix}{digits}"))
    }
}

pub fn reminder_text(appointment: &Appointment) -> String {
    format!(
        "📅 *Recordatorio de Cita Médica*\n\n\
         Hola {}, este es un recordatorio de tu cita médica.\n\
         🏥 *Especialidad:* {}\n\
         👨‍⚕️ *Médico:* {}\n\
         📅 *Fecha:* {}\n\n\
         Por favor llega 15 minutos antes de tu hora programada.",
        appointment.patient_name, appointment.specialty, appointment.physician_name, appointment.date
    )
}
