//! SMTP notice to the clinic when a patient cancels

use super::CancellationNotifier;
use crate::datastore::Appointment;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("invalid mailbox {0}: {1}")]
    Address(String, lettre::address::AddressError),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("failed to build e-mail: {0}")]
    Build(#[from] lettre::error::Error),
}

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Defaults to `username` when absent
    pub sender: Option<String>,
    pub recipient: String,
}

/// Sends an HTML summary of each cancelled appointment to the clinic inbox
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifierError> {
        let sender_address = config.sender.as_deref().unwrap_or(&config.username);
        let sender = parse_mailbox(sender_address)?;
        let recipient = parse_mailbox(&config.recipient)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            mailer,
            sender,
            recipient,
        })
    }

    fn build_message(&self, appointment: &Appointment) -> Result<Message, NotifierError> {
        Ok(Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(format!("Cancelación de cita - {}", appointment.patient_name))
            .header(ContentType::TEXT_HTML)
            .body(cancellation_body(appointment))?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifierError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifierError::Address(address.to_string(), e))
}

#[async_trait]
impl CancellationNotifier for SmtpNotifier {
    async fn notify_cancellation(&self, appointment: &Appointment) -> bool {
        let message = match self.build_message(appointment) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build cancellation e-mail");
                return false;
            }
        };

        match self.mailer.send(message).await {
            Ok(_) => {
                tracing::info!(
                    appointment_id = ?appointment.id,
                    recipient = %self.recipient,
                    "Cancellation e-mail sent"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send cancellation e-mail");
                false
            }
        }
    }
}

/// HTML body listing the cancelled appointment
pub fn cancellation_body(appointment: &Appointment) -> String {
    format!(
        "<h2>Cancelación de cita médica</h2>\n\
         <p>Se ha cancelado la siguiente cita:</p>\n\
         <ul>\n\
         <li><strong>Paciente:</strong> {}</li>\n\
         <li><strong>Documento:</strong> {} {}</li>\n\
         <li><strong>Especialidad:</strong> {}</li>\n\
         <li><strong>Médico:</strong> {}</li>\n\
         <li><strong>Fecha:</strong> {}</li>\n\
         <li><strong>Teléfono:</strong> {}</li>\n\
         </ul>\n",
        escape_html(&appointment.patient_name),
        escape_html(&appointment.document_type),
        escape_html(&appointment.document_number),
        escape_html(&appointment.specialty),
        escape_html(&appointment.physician_name),
        escape_html(&appointment.date),
        escape_html(&appointment.patient_phone),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
