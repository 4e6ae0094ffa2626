pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::leads::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/mandates", get(handlers::handle_mandates))
        // Model-only calls
        .route("/api/v1/search", post(handlers::handle_search))
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        // Lead collection
        .route(
            "/api/v1/leads",
            get(handlers::handle_list_leads).post(handlers::handle_create_lead),
        )
        .route(
            "/api/v1/leads/analyze",
            post(handlers::handle_analyze_and_create),
        )
        .route(
            "/api/v1/leads/:id/status",
            patch(handlers::handle_update_status),
        )
        .route(
            "/api/v1/leads/:id/toggle",
            post(handlers::handle_toggle_status),
        )
        .route("/api/v1/leads/stream", get(handlers::handle_lead_stream))
        .route("/api/v1/session", post(handlers::handle_resolve_session))
        .with_state(state)
}
