pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::entitlements::handlers as entitlement_handlers;
use crate::payments::handlers as payment_handlers;
use crate::resumes::handlers as resume_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::health_handler))
        // Payment provider callback
        .route(
            "/webhook/payment",
            post(payment_handlers::handle_payment_webhook),
        )
        // Client-facing API
        .route("/api/generate", post(resume_handlers::handle_generate))
        .route("/api/dashboard", get(resume_handlers::handle_dashboard))
        .route(
            "/api/token/status",
            get(entitlement_handlers::handle_token_status),
        )
        .with_state(state)
}
