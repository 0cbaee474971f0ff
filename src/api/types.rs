//! WhatsApp Cloud webhook payloads and API responses

use crate::runtime::InboundMessage;
use serde::{Deserialize, Serialize};

/// Query of the subscription handshake
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Notification body posted by the channel
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

/// Delivery statuses arrive here too, with no `messages`
#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Unix seconds, sent as a string
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

impl WebhookPayload {
    /// Every text message in every entry and change. Media, reactions and
    /// status updates are skipped.
    pub fn text_messages(&self) -> Vec<InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .flat_map(|change| &change.value.messages)
            .filter_map(WebhookMessage::to_inbound)
            .collect()
    }

    /// Text messages grouped per sender, each group in delivery order
    pub fn batches_by_sender(&self) -> Vec<Vec<InboundMessage>> {
        let mut batches: Vec<Vec<InboundMessage>> = Vec::new();
        for message in self.text_messages() {
            match batches
                .iter_mut()
                .find(|batch| batch[0].identifier == message.identifier)
            {
                Some(batch) => batch.push(message),
                None => batches.push(vec![message]),
            }
        }
        batches
    }
}

impl WebhookMessage {
    fn to_inbound(&self) -> Option<InboundMessage> {
        let body = &self.text.as_ref()?.body;
        let mut message = InboundMessage::new(self.from.clone(), body.clone());
        if let Some(id) = &self.id {
            message = message.with_message_id(id.clone());
        }
        if let Some(ts) = self.timestamp.as_deref().and_then(|t| t.parse::<i64>().ok()) {
            message = message.with_received_at(ts);
        }
        Some(message)
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
