pub mod attempts;
pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

/// Builds the full attempt surface. Shared by `main` and the integration
/// tests so both exercise the same router.
pub fn router(state: AppState, public_rps: u32) -> Router {
    let attempt_api = Router::new()
        .route("/api/attempts/start", post(attempts::start_attempt))
        .route("/api/attempts/:id/answer", patch(attempts::save_answer))
        .route(
            "/api/attempts/:id/violation",
            post(attempts::report_violation),
        )
        .route("/api/attempts/:id/submit", post(attempts::submit_attempt))
        .route("/api/attempts/:id/heartbeat", post(attempts::heartbeat))
        .route("/api/attempts/:id/status", get(attempts::get_status))
        .layer(axum::middleware::from_fn(
            crate::middleware::identity::require_identity,
        ))
        .layer(axum::middleware::from_fn_with_state(
            crate::middleware::rate_limit::new_rps_state(public_rps),
            crate::middleware::rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(attempt_api)
        .with_state(state)
}
