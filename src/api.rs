//! HTTP API: the channel webhook plus health and version probes

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::InboundHandler;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn InboundHandler>,
    /// Subscription handshake secret; without one verification always fails
    pub verify_token: Option<String>,
}

impl AppState {
    pub fn new(runtime: Arc<dyn InboundHandler>, verify_token: Option<String>) -> Self {
        Self {
            runtime,
            verify_token,
        }
    }
}
