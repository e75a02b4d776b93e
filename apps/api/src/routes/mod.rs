pub mod audit;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Pipeline triggers
        .route("/api/v1/pages/:id/score", post(audit::handle_trigger_score))
        .route(
            "/api/v1/projects/:id/import",
            post(audit::handle_trigger_import),
        )
        .route(
            "/api/v1/projects/:id/alerts",
            post(audit::handle_trigger_alerts),
        )
        // Guidelines
        .route(
            "/api/v1/pages/:id/guidelines",
            get(audit::handle_get_guidelines),
        )
        // Auto-optimize changes
        .route(
            "/api/v1/pages/:id/optimize",
            post(audit::handle_generate_changes),
        )
        .route("/api/v1/pages/:id/changes", get(audit::handle_list_changes))
        .route(
            "/api/v1/changes/:id/apply",
            post(audit::handle_apply_change),
        )
        .route(
            "/api/v1/changes/:id/reject",
            post(audit::handle_reject_change),
        )
        // Internal link suggestions
        .route(
            "/api/v1/pages/:id/links",
            post(audit::handle_generate_links).get(audit::handle_list_links),
        )
        .route("/api/v1/links/:id/apply", post(audit::handle_apply_link))
        .route("/api/v1/links/:id/reject", post(audit::handle_reject_link))
        // Alerts
        .route(
            "/api/v1/pages/:id/alerts",
            get(audit::handle_list_alerts).post(audit::handle_trigger_page_alerts),
        )
        .with_state(state)
}
