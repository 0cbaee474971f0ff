//! Supabase (PostgREST) implementation of the appointment datastore

use super::{
    Appointment, AppointmentKey, AppointmentStore, Confirmation, DatastoreError, DocumentType,
};
use crate::normalize::is_all_digits;
use crate::runtime::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the Supabase REST endpoint
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub api_key: String,
    pub table: String,
}

/// Appointment datastore backed by a Supabase table
pub struct SupabaseStore {
    client: Client,
    endpoint: String,
    api_key: String,
    clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
struct ConfirmationPatch {
    #[serde(rename = "confirmacionCita")]
    confirmation: Confirmation,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, DatastoreError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DatastoreError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock that dates reminder lookups
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn target_date(&self, days_ahead: u32) -> Result<NaiveDate, DatastoreError> {
        self.clock
            .today()
            .checked_add_days(Days::new(u64::from(days_ahead)))
            .ok_or_else(|| DatastoreError::invalid_input("reminder date out of range"))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_rows(
        &self,
        operation: &'static str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Appointment>, DatastoreError> {
        let start = Instant::now();
        let request = self
            .authorized(self.client.get(&self.endpoint))
            .query(&[("select", "*")])
            .query(filters);

        let rows = execute(request).await;
        log_outcome(operation, start, &rows);
        rows
    }
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn find_appointments(
        &self,
        document_type: DocumentType,
        document_number: &str,
    ) -> Result<Vec<Appointment>, DatastoreError> {
        if !is_all_digits(document_number) {
            return Err(DatastoreError::invalid_input(format!(
                "document number is not numeric: {document_number}"
            )));
        }

        self.fetch_rows(
            "find_appointments",
            &[
                ("tipoDocumento", format!("eq.{document_type}")),
                ("documento", format!("eq.{document_number}")),
            ],
        )
        .await
    }

    async fn update_confirmation(
        &self,
        key: &AppointmentKey,
        answer: Confirmation,
    ) -> Result<bool, DatastoreError> {
        let filters: Vec<(&str, String)> = match key {
            AppointmentKey::Id(id) => vec![("id", format!("eq.{id}"))],
            AppointmentKey::Document {
                document_type,
                document_number,
                date,
            } => {
                if !is_all_digits(document_number) {
                    return Err(DatastoreError::invalid_input(format!(
                        "document number is not numeric: {document_number}"
                    )));
                }
                vec![
                    ("tipoDocumento", format!("eq.{document_type}")),
                    ("documento", format!("eq.{document_number}")),
                    ("fechaCita", format!("eq.{date}")),
                ]
            }
        };

        let start = Instant::now();
        let request = self
            .authorized(self.client.patch(&self.endpoint))
            .header("Prefer", "return=representation")
            .query(&filters)
            .json(&ConfirmationPatch {
                confirmation: answer,
            });

        let rows = execute(request).await;
        log_outcome("update_confirmation", start, &rows);
        rows.map(|updated| !updated.is_empty())
    }

    async fn find_upcoming(&self, days_ahead: u32) -> Result<Vec<Appointment>, DatastoreError> {
        let target = self.target_date(days_ahead)?;

        self.fetch_rows(
            "find_upcoming",
            &[("fechaCita", format!("eq.{}", target.format("%Y-%m-%d")))],
        )
        .await
    }
}

async fn execute(request: RequestBuilder) -> Result<Vec<Appointment>, DatastoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| DatastoreError::network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DatastoreError::from_status(status.as_u16(), &body));
    }

    response
        .json::<Vec<Appointment>>()
        .await
        .map_err(|e| DatastoreError::decode(e.to_string()))
}

fn log_outcome(
    operation: &'static str,
    start: Instant,
    result: &Result<Vec<Appointment>, DatastoreError>,
) {
    let duration = start.elapsed();
    match result {
        Ok(rows) => {
            tracing::info!(
                operation,
                duration_ms = %duration.as_millis(),
                rows = rows.len(),
                "Datastore request completed"
            );
        }
        Err(e) => {
            tracing::error!(
                operation,
                duration_ms = %duration.as_millis(),
                error = %e.message,
                transient = e.kind.is_transient(),
                "Datastore request failed"
            );
        }
    }
}
