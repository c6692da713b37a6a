use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metronome_scheduler::Scheduler;

/// Shared state — passed as Arc<AppState> to all handlers.
pub struct AppState {
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

/// Assemble the admin router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/c/job/list", get(crate::http::jobs::list_handler))
        .route("/c/job/log", get(crate::http::jobs::log_handler))
        .route("/c/job/pause", post(crate::http::jobs::pause_handler))
        .route("/c/job/start", post(crate::http::jobs::start_handler))
        .route("/c/job/run", post(crate::http::jobs::run_handler))
        .with_state(state)
}
