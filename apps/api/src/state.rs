use std::sync::Arc;

use crate::pipeline::AtsService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AtsService>,
}
