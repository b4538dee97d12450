pub mod health;

use axum::{extract::DefaultBodyLimit, routing::{get, post}, Router};

use crate::report::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/health", get(health::health_handler))
        // Report API
        .route("/api/v1/reports", post(handlers::handle_create_report))
        .route("/api/v1/reports/classify", post(handlers::handle_classify))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
