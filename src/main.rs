//! OHIBot - WhatsApp appointment confirmation assistant
//!
//! Patients confirm or cancel clinic appointments over chat; confirmed
//! appointments get a reminder a few days ahead.

mod api;
mod config;
mod datastore;
mod lockout;
mod normalize;
mod reminder;
mod runtime;
mod state_machine;
mod store;
mod transport;

use api::{create_router, AppState};
use config::{Config, SessionBackend};
use datastore::SupabaseStore;
use reminder::ReminderScheduler;
use runtime::{CancellationNotifier, Clock, ProductionRuntime, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use store::{JsonFileStore, SessionStore, SqliteStore};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use transport::{SmtpNotifier, WhatsAppClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ohibot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration errors are fatal
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    // Session persistence
    let session_store: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Json => {
            tracing::info!(path = %config.session_state_path.display(), "Using JSON session file");
            Arc::new(JsonFileStore::new(&config.session_state_path))
        }
        SessionBackend::Sqlite => {
            tracing::info!(path = %config.session_state_path.display(), "Opening session database");
            Arc::new(SqliteStore::open(&config.session_state_path)?)
        }
    };

    // Collaborators
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let datastore = Arc::new(SupabaseStore::new(&config.supabase)?.with_clock(clock.clone()));
    let whatsapp = Arc::new(WhatsAppClient::new(&config.whatsapp)?);

    let mut runtime: ProductionRuntime = ProductionRuntime::restore(
        session_store,
        datastore.clone(),
        whatsapp.clone(),
        config.policy.clone(),
    )
    .await
    .with_clock(clock)
    .with_ignored_senders(config.ignored_senders.clone());

    match &config.smtp {
        Some(smtp) => {
            let notifier: Arc<dyn CancellationNotifier> = Arc::new(SmtpNotifier::new(smtp)?);
            runtime = runtime.with_notifier(notifier);
            tracing::info!(server = %smtp.server, "Cancellation e-mails enabled");
        }
        None => tracing::warn!("SMTP not configured, cancellation e-mails disabled"),
    }

    let shutdown = CancellationToken::new();

    // Reminder loop
    let scheduler = ReminderScheduler::new(datastore, whatsapp, config.reminder.clone());
    let reminder_task = tokio::spawn(scheduler.run(shutdown.clone()));

    // Create router
    let state = AppState::new(Arc::new(runtime), config.verify_token.clone());
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("OHIBot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = reminder_task.await {
        tracing::error!(error = %e, "Reminder task ended abnormally");
    }

    Ok(())
}
