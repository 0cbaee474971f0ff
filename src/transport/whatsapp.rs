//! WhatsApp Cloud API client

use super::{MessageTransport, TransportError};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};

pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Credentials for the WhatsApp Business number that sends messages
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub phone_number_id: String,
    pub access_token: String,
}

/// Sends plain text messages through the WhatsApp Cloud API
pub struct WhatsAppClient {
    client: Client,
    messages_url: String,
    access_token: String,
}

#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    r#type: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

impl<'a> TextMessageRequest<'a> {
    fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            r#type: "text",
            text: TextBody { body },
        }
    }
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.phone_number_id
            ),
            access_token: config.access_token.clone(),
        })
    }

    /// Deliver one text message, reporting why it failed
    pub async fn try_send(&self, to: &str, body: &str) -> Result<(), TransportError> {
        if to.trim().is_empty() {
            return Err(TransportError::invalid_request("empty recipient"));
        }

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&TextMessageRequest::new(to, body))
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.unwrap_or_default();
        let mut error = TransportError::from_status(status.as_u16(), &text);
        if let Some(delay) = retry_after {
            error = error.with_retry_after(delay);
        }
        Err(error)
    }
}

#[async_trait]
impl MessageTransport for WhatsAppClient {
    async fn send(&self, identifier: &str, text: &str) -> bool {
        let start = Instant::now();
        let result = self.try_send(identifier, text).await;
        let duration = start.elapsed();

        match result {
            Ok(()) => {
                tracing::info!(
                    identifier,
                    duration_ms = %duration.as_millis(),
                    "Message sent"
                );
                tracing::debug!(identifier, body = text, "Outbound message body");
                true
            }
            Err(e) => {
                tracing::error!(
                    identifier,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    retry_after_secs = e.retry_after.map(|d| d.as_secs()),
                    "Message delivery failed"
                );
                false
            }
        }
    }
}
